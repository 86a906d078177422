//! Archive path derivation.
//!
//! ```text
//! {base}/{brand}/{year}/{MM}/{year}-{MM}-{DD} {title}.json
//! {base}/{brand}/0/0/00-00 {title}.json          (no publish date)
//! ```
//!
//! Names depend only on the publish date, the title and the flavor. Two
//! articles deriving the same name overwrite each other.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::error::Result;
use crate::models::FilenameFlavor;

const MAX_FILENAME_LENGTH: usize = 255;
const FALLBACK_TITLE: &str = "unknown_title";

static WINDOWS_RESTRICTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));
static POSIX_RESTRICTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*']"#).expect("valid regex"));

/// Derived location of one article in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePath {
    pub directory: PathBuf,
    pub file_name: String,
}

impl ArchivePath {
    /// Full path of the article file.
    pub fn full_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Transliterate a title to ASCII and strip characters the flavor forbids.
pub fn sanitize_title(title: &str, flavor: FilenameFlavor) -> String {
    let ascii = deunicode::deunicode(title);

    let cleaned = match flavor {
        FilenameFlavor::Posix => POSIX_RESTRICTED.replace_all(&ascii, "").into_owned(),
        FilenameFlavor::Windows => {
            let stripped = WINDOWS_RESTRICTED.replace_all(&ascii, "");
            stripped
                .trim_end_matches(['.', ' '])
                .chars()
                .take(MAX_FILENAME_LENGTH)
                .collect()
        }
    };

    if cleaned.trim().is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        cleaned
    }
}

/// Directory holding a brand's articles of `date`'s month.
pub fn month_directory(base: &Path, brand: &str, date: NaiveDate) -> PathBuf {
    base.join(brand)
        .join(date.year().to_string())
        .join(format!("{:02}", date.month()))
}

/// File name prefix shared by every article published on `date`.
pub fn date_prefix(date: NaiveDate) -> String {
    format!("{:02}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Derive directory and file name for an article.
pub fn derive_archive_path(
    base: &Path,
    brand: &str,
    title: &str,
    publish_date: Option<NaiveDateTime>,
    flavor: FilenameFlavor,
) -> ArchivePath {
    let clean_title = sanitize_title(title, flavor);

    let (directory, file_name) = match publish_date {
        Some(date) => (
            month_directory(base, brand, date.date()),
            format!("{} {clean_title}.json", date_prefix(date.date())),
        ),
        None => (
            base.join(brand).join("0").join("0"),
            format!("{:02}-{:02} {clean_title}.json", 0, 0),
        ),
    };

    ArchivePath {
        directory,
        file_name,
    }
}

/// Create a directory tree; succeeds if it already exists.
pub async fn ensure_directory(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        log::debug!("Directory already exists: {}", path.display());
        return Ok(());
    }
    tokio::fs::create_dir_all(path).await?;
    log::debug!("Directory created: {}", path.display());
    Ok(())
}
