//! One batch: build its sources, then extract and archive their articles.
//!
//! Both phases run on the shared [`WorkerPool`] and end at its barrier.
//! Failures are tallied and routed to the [`FailureTracker`]; nothing that
//! happens to one source or article stops the rest of the batch.

use std::path::PathBuf;
use std::sync::Arc;

use crate::models::{BatchReport, Source, SourceEntry};
use crate::pipeline::circuit_breaker::{FailureTracker, FailureVerdict};
use crate::pipeline::pool::WorkerPool;
use crate::services::ArticleExtractor;
use crate::storage::ArticleArchive;

/// Collaborators shared by every batch of a run.
#[derive(Clone)]
pub struct CrawlContext {
    pub extractor: Arc<dyn ArticleExtractor>,
    pub archive: Arc<dyn ArticleArchive>,
    pub tracker: Arc<FailureTracker>,
    pub pool: WorkerPool,
}

/// What happened to one article.
#[derive(Debug)]
enum ArticleOutcome {
    Saved(PathBuf),
    /// Source was circuit-broken before the article's turn
    Skipped,
    ExtractionFailed { tripped: bool },
    PersistFailed,
}

/// Crawl one batch of sources.
///
/// On the first cycle of the process the extractor's memo of each source is
/// cleared before building.
pub async fn crawl_batch(ctx: &CrawlContext, entries: &[SourceEntry], first_run: bool) -> BatchReport {
    let mut report = BatchReport {
        sources_attempted: entries.len(),
        ..BatchReport::default()
    };
    let mut sources: Vec<Source> = entries.iter().map(Source::new).collect();

    if first_run {
        for source in &sources {
            if let Err(e) = ctx.extractor.clear_cache(source).await {
                log::warn!("Could not clear article memo of {}: {e}", source.url);
            }
        }
    }

    build_sources(ctx, &mut sources, &mut report).await;
    extract_articles(ctx, &mut sources, &mut report).await;

    for source in &mut sources {
        source.mark_drained();
    }
    report
}

/// Build phase: discover article locations of every source in the batch.
async fn build_sources(ctx: &CrawlContext, sources: &mut [Source], report: &mut BatchReport) {
    let mut batch = ctx.pool.batch::<Vec<String>>();
    for source in sources.iter() {
        let extractor = Arc::clone(&ctx.extractor);
        let handle = source.clone();
        batch.submit(source.url.clone(), async move { extractor.build(&handle).await });
    }

    // Outcomes come back in submission order.
    for (source, outcome) in sources.iter_mut().zip(batch.join().await) {
        match outcome.result {
            Ok(urls) => {
                log::info!("Built {} ({} articles)", source.name, urls.len());
                source.mark_built(urls);
                report.sources_built += 1;
            }
            Err(e) => {
                log::warn!("Build failed for {}: {e}", source.name);
                source.mark_build_failed();
                report.build_failures += 1;

                if let FailureVerdict::Tripped { .. } = ctx.tracker.record_failure(&source.url).await {
                    source.circuit_break();
                    report.circuit_broken.push(source.url.clone());
                }
            }
        }
    }
}

/// Extraction phase: every article of every built, still-active source.
async fn extract_articles(ctx: &CrawlContext, sources: &mut [Source], report: &mut BatchReport) {
    let mut batch = ctx.pool.batch::<ArticleOutcome>();
    let mut owners = Vec::new();

    for (index, source) in sources.iter().enumerate() {
        if !source.is_active() || ctx.tracker.is_broken(&source.url) {
            continue;
        }
        for article_url in &source.article_urls {
            owners.push(index);
            batch.submit(
                article_url.clone(),
                extract_one(
                    ctx.clone(),
                    source.url.clone(),
                    source.brand.clone(),
                    article_url.clone(),
                ),
            );
        }
    }

    if batch.is_empty() {
        return;
    }
    log::debug!("Extracting {} articles", batch.len());

    for (index, outcome) in owners.into_iter().zip(batch.join().await) {
        let source = &mut sources[index];
        match outcome.result {
            Ok(ArticleOutcome::Saved(_)) => report.articles_saved += 1,
            Ok(ArticleOutcome::Skipped) => report.articles_skipped += 1,
            Ok(ArticleOutcome::PersistFailed) => report.persistence_failures += 1,
            Ok(ArticleOutcome::ExtractionFailed { tripped }) => {
                report.extraction_failures += 1;
                if tripped {
                    source.circuit_break();
                    report.circuit_broken.push(source.url.clone());
                }
            }
            Err(e) => {
                // Panicked or aborted task
                log::error!("Extraction of {} did not complete: {e}", outcome.label);
                report.extraction_failures += 1;
                if let FailureVerdict::Tripped { .. } = ctx.tracker.record_failure(&source.url).await {
                    source.circuit_break();
                    report.circuit_broken.push(source.url.clone());
                }
            }
        }
    }
}

async fn extract_one(
    ctx: CrawlContext,
    source_url: String,
    brand: String,
    article_url: String,
) -> crate::error::Result<ArticleOutcome> {
    if ctx.tracker.is_broken(&source_url) {
        return Ok(ArticleOutcome::Skipped);
    }

    let article = match ctx.extractor.extract(&article_url).await {
        Ok(article) => article,
        Err(e) => {
            log::warn!("Extraction failed: {e}");
            let tripped = e.is_source_failure()
                && matches!(
                    ctx.tracker.record_failure(&source_url).await,
                    FailureVerdict::Tripped { .. }
                );
            return Ok(ArticleOutcome::ExtractionFailed { tripped });
        }
    };

    match ctx.archive.save(&brand, &article).await {
        Ok(path) => Ok(ArticleOutcome::Saved(path)),
        Err(e) => {
            log::error!("{e}");
            Ok(ArticleOutcome::PersistFailed)
        }
    }
}
