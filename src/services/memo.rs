//! Memoized article URLs.
//!
//! One text file per source, named by the SHA-256 of the source URL, holding
//! one article URL per line.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::Result;

#[derive(Debug)]
pub struct MemoCache {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl MemoCache {
    /// Cache stored under `{cache_dir}/memoized`.
    pub fn new(cache_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: cache_dir.as_ref().join("memoized"),
            lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, source_url: &str) -> PathBuf {
        let digest = Sha256::digest(source_url.as_bytes());
        self.dir.join(format!("{}.txt", hex::encode(digest)))
    }

    /// URLs recorded for a source. A missing file is an empty set.
    pub async fn load(&self, source_url: &str) -> Result<HashSet<String>> {
        match tokio::fs::read_to_string(self.path_for(source_url)).await {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Keep only URLs not seen before, and remember them.
    pub async fn filter_new(&self, source_url: &str, urls: Vec<String>) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;

        let seen = self.load(source_url).await?;
        let fresh: Vec<String> = urls.into_iter().filter(|u| !seen.contains(u)).collect();
        if fresh.is_empty() {
            return Ok(fresh);
        }

        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(source_url))
            .await?;
        let mut lines = fresh.join("\n");
        lines.push('\n');
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;

        Ok(fresh)
    }

    /// Drop the record of a source.
    pub async fn clear(&self, source_url: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(self.path_for(source_url)).await {
            Ok(()) => {
                log::debug!("Cleared article memo for {source_url}");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
