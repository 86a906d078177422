//! Local filesystem archive.
//!
//! Articles are written as pretty-printed JSON (four-space indent), one file
//! per article, through a temp file and a rename so that a crash never leaves
//! a half-written article behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{Article, FilenameFlavor};
use crate::storage::ArticleArchive;
use crate::storage::paths::{derive_archive_path, ensure_directory};

/// Distinguishes temp files of concurrent writers.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local filesystem archive backend.
#[derive(Debug, Clone)]
pub struct LocalArchive {
    root_dir: PathBuf,
    flavor: FilenameFlavor,
}

impl LocalArchive {
    /// Create a LocalArchive rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, flavor: FilenameFlavor) -> Self {
        Self {
            root_dir: root_dir.into(),
            flavor,
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        // Kept short: the final name may already be at the filesystem limit.
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_file_name(format!(".{}-{seq}.tmp", std::process::id()));

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(AppError::Io(e));
        }
        Ok(())
    }

    /// Serialize with a four-space indent.
    fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
        Ok(buf)
    }
}

#[async_trait]
impl ArticleArchive for LocalArchive {
    async fn save(&self, brand: &str, article: &Article) -> Result<PathBuf> {
        let target = derive_archive_path(
            &self.root_dir,
            brand,
            &article.title,
            article.publish_date,
            self.flavor,
        );
        let path = target.full_path();

        if article.publish_date.is_none() {
            log::debug!("No publish date for '{}', using 0/0", article.title);
        }

        let result = async {
            ensure_directory(&target.directory).await?;
            let bytes = Self::to_json(article)?;
            self.write_bytes(&path, &bytes).await
        }
        .await;

        match result {
            Ok(()) => {
                log::info!("Article saved to {}", path.display());
                Ok(path)
            }
            Err(e) => Err(AppError::persistence(&path, e)),
        }
    }
}

/// Pick the archive root.
///
/// Uses `configured` if it exists. Otherwise falls back to
/// `{fallback_root}/archive/news`, creating it.
pub async fn resolve_archive_dir(configured: &Path, fallback_root: &Path) -> Result<PathBuf> {
    if tokio::fs::try_exists(configured).await.unwrap_or(false) {
        log::info!("Base directory {} exists", configured.display());
        return Ok(configured.to_path_buf());
    }

    let local = fallback_root.join("archive").join("news");
    tokio::fs::create_dir_all(&local).await.map_err(|e| {
        AppError::config(format!(
            "base directory {} does not exist and fallback {} cannot be created: {e}",
            configured.display(),
            local.display()
        ))
    })?;
    log::warn!(
        "Base directory {} does not exist. Using local directory {}",
        configured.display(),
        local.display()
    );
    Ok(local)
}
