//! Archive lookups.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;

use crate::error::Result;
use crate::storage::paths::{date_prefix, month_directory};

/// Every archived article published on `date`, across all brands.
///
/// Looks only in each brand's `{year}/{MM}` folder. Results are sorted.
pub async fn find_articles_by_date(base: &Path, date: NaiveDate) -> Result<Vec<PathBuf>> {
    let started = Instant::now();
    let prefix = date_prefix(date);
    let mut matched = Vec::new();

    let mut brands = tokio::fs::read_dir(base).await?;
    while let Some(brand) = brands.next_entry().await? {
        if !brand.file_type().await?.is_dir() {
            continue;
        }
        let brand = brand.file_name().to_string_lossy().into_owned();
        let month = month_directory(base, &brand, date);

        let mut files = match tokio::fs::read_dir(&month).await {
            Ok(files) => files,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(file) = files.next_entry().await? {
            let name = file.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".json") {
                matched.push(file.path());
            }
        }
    }

    matched.sort();
    log::info!(
        "Found {} articles for {} in {:.3}s",
        matched.len(),
        prefix,
        started.elapsed().as_secs_f64()
    );
    Ok(matched)
}
