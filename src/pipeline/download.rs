//! Bulk download of a fixed URL list into one brand folder.
//!
//! Runs outside the cycle loop: no source is built and no failure is
//! tracked. Each URL is extracted and saved on the worker pool.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::BatchReport;
use crate::pipeline::pool::WorkerPool;
use crate::services::ArticleExtractor;
use crate::storage::ArticleArchive;

/// Read a URL list: one per line, blank lines and `#` comments skipped,
/// duplicates dropped.
pub async fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;

    let mut seen = HashSet::new();
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| seen.insert(l.to_string()))
        .map(str::to_string)
        .collect())
}

/// Extract every URL and save it under `brand`.
pub async fn download_articles(
    extractor: Arc<dyn ArticleExtractor>,
    archive: Arc<dyn ArticleArchive>,
    pool: &WorkerPool,
    brand: &str,
    urls: Vec<String>,
) -> Result<BatchReport> {
    let brand = brand.trim();
    if brand.is_empty() || brand.contains(['/', '\\']) || brand == "." || brand == ".." {
        return Err(AppError::validation(format!("invalid source folder '{brand}'")));
    }

    let mut report = BatchReport::default();
    if urls.is_empty() {
        log::error!("No URLs to process");
        return Ok(report);
    }

    let mut batch = pool.batch();
    for url in urls {
        let extractor = Arc::clone(&extractor);
        let archive = Arc::clone(&archive);
        let brand = brand.to_string();
        batch.submit(url.clone(), async move {
            log::info!("Processing URL: {url}");
            let article = extractor.extract(&url).await?;
            archive.save(&brand, &article).await
        });
    }

    for outcome in batch.join().await {
        match outcome.result {
            Ok(_) => report.articles_saved += 1,
            Err(e @ AppError::Persistence { .. }) => {
                log::error!("{e}");
                report.persistence_failures += 1;
            }
            Err(e) => {
                log::error!("Error downloading article from {}: {e}", outcome.label);
                report.extraction_failures += 1;
            }
        }
    }

    log::info!(
        "Downloaded {} articles into {brand} ({} extraction failures, {} write failures)",
        report.articles_saved,
        report.extraction_failures,
        report.persistence_failures
    );
    Ok(report)
}
