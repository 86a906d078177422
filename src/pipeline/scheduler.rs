//! Batch cycle scheduler.
//!
//! Each cycle re-reads the active sources, shuffles them, cuts the list into
//! batches of `sources_per_batch` and crawls the batches one after another.
//! Between cycles it waits `cycle_interval_secs`. A shutdown request is
//! honoured before every batch and during the wait; the batch in flight is
//! always allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::watch;

use crate::models::{Cycle, CycleReport, Settings, SourceEntry};
use crate::pipeline::circuit_breaker::{CircuitBreakerConfig, FailureTracker};
use crate::pipeline::crawl::{CrawlContext, crawl_batch};
use crate::pipeline::pool::WorkerPool;
use crate::services::ArticleExtractor;
use crate::storage::{ArticleArchive, SourceStore};

/// Shortest wait after a cycle that found no source to crawl.
const IDLE_BACKOFF: Duration = Duration::from_secs(60);

pub struct Scheduler {
    settings: Settings,
    store: Arc<dyn SourceStore>,
    ctx: CrawlContext,
    cycle: Cycle,
    shutdown: watch::Receiver<bool>,
    /// Last successfully read source list
    last_known: Vec<SourceEntry>,
}

impl Scheduler {
    pub fn new(
        settings: Settings,
        store: Arc<dyn SourceStore>,
        extractor: Arc<dyn ArticleExtractor>,
        archive: Arc<dyn ArticleArchive>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let tracker = Arc::new(FailureTracker::new(
            CircuitBreakerConfig::from(&settings),
            Arc::clone(&store),
        ));
        let ctx = CrawlContext {
            extractor,
            archive,
            tracker,
            pool: WorkerPool::new(settings.max_workers),
        };

        Self {
            settings,
            store,
            ctx,
            cycle: Cycle::new(),
            shutdown,
            last_known: Vec::new(),
        }
    }

    /// Seed the source list used until the store is first read successfully.
    pub fn with_sources(mut self, entries: Vec<SourceEntry>) -> Self {
        self.last_known = entries;
        self
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn tracker(&self) -> &FailureTracker {
        &self.ctx.tracker
    }

    /// Run cycles until shutdown, or a single one when `run_once` is set.
    ///
    /// Returns the number of cycles run.
    pub async fn run(&mut self, run_once: bool) -> u64 {
        let mut completed = 0;
        loop {
            if self.is_shutdown() {
                log::info!("Shutdown requested, not starting cycle {}", self.cycle.ordinal);
                break;
            }

            let report = self.run_cycle().await;
            completed += 1;
            if run_once || report.interrupted {
                break;
            }

            self.cycle.advance();
            self.wait_for_next_cycle(report.batches == 0).await;
        }
        completed
    }

    /// Run exactly one cycle over every active source.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::new(self.cycle.ordinal);
        let entries = self.active_entries().await;
        let batches = shuffled_batches(entries, self.settings.sources_per_batch);

        log::info!(
            "Starting cycle {} ({} batches of up to {} sources)",
            self.cycle.ordinal,
            batches.len(),
            self.settings.sources_per_batch
        );

        for (number, batch) in batches.iter().enumerate() {
            if self.is_shutdown() {
                log::warn!("Shutdown requested, stopping before batch {}", number + 1);
                report.interrupted = true;
                break;
            }

            let names: Vec<&str> = batch.iter().map(|e| e.name.as_str()).collect();
            log::info!("Batch {}/{}: {}", number + 1, batches.len(), names.join(", "));

            let batch_report = crawl_batch(&self.ctx, batch, self.cycle.first_run).await;
            report.absorb(batch_report);
        }

        log::info!("{report}");
        report
    }

    /// Sources to crawl this cycle.
    ///
    /// Falls back to the last list read if the store cannot be read.
    async fn active_entries(&mut self) -> Vec<SourceEntry> {
        match self.store.load_sources().await {
            Ok(entries) => self.last_known = entries,
            Err(e) => log::error!("Could not re-read sources, using last known list: {e}"),
        }

        self.last_known
            .iter()
            .filter(|e| !e.failed && !self.ctx.tracker.is_broken(&e.base_url))
            .cloned()
            .collect()
    }

    /// Wait `cycle_interval_secs`, or at least [`IDLE_BACKOFF`] when the
    /// last cycle had nothing to crawl.
    async fn wait_for_next_cycle(&mut self, idle: bool) {
        let mut interval = Duration::from_secs(self.settings.cycle_interval_secs);
        if idle {
            interval = interval.max(IDLE_BACKOFF);
            log::warn!("No active sources to crawl");
        }
        if interval.is_zero() {
            return;
        }
        log::info!("Next cycle in {}s", interval.as_secs());

        let sleep = tokio::time::sleep(interval);
        tokio::pin!(sleep);
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = &mut sleep => {}
            sender_gone = async { shutdown.wait_for(|stop| *stop).await.is_err() } => {
                // Nobody can ask for shutdown any more.
                if sender_gone {
                    sleep.await;
                }
            }
        }
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Shuffle `entries` and cut them into batches of at most `size`.
fn shuffled_batches(mut entries: Vec<SourceEntry>, size: usize) -> Vec<Vec<SourceEntry>> {
    entries.shuffle(&mut rand::rng());
    entries.chunks(size.max(1)).map(<[SourceEntry]>::to_vec).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilenameFlavor;
    use crate::pipeline::testing::{MemoryStore, StubExtractor};
    use crate::storage::{LocalArchive, YamlSourceStore};
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    const CONFIG: &str = r#"settings:
  base_archive_dir: /unused
  max_workers: 2
  sources_per_batch: 1
news_sources:
  Good:
    base_url: https://good.test
  Bad:
    base_url: https://bad.test
"#;

    fn entry(i: usize) -> SourceEntry {
        SourceEntry {
            name: format!("S{i}"),
            base_url: format!("https://s{i}.test"),
            failed: false,
        }
    }

    fn scheduler(
        store: Arc<dyn SourceStore>,
        extractor: Arc<StubExtractor>,
        archive_dir: &std::path::Path,
        shutdown: watch::Receiver<bool>,
    ) -> Scheduler {
        let mut settings = Settings::new(archive_dir);
        settings.sources_per_batch = 1;
        settings.max_workers = 2;
        Scheduler::new(
            settings,
            store,
            extractor,
            Arc::new(LocalArchive::new(archive_dir, FilenameFlavor::Posix)),
            shutdown,
        )
    }

    #[test]
    fn test_batches_cover_every_source() {
        let entries: Vec<_> = (0..5).map(entry).collect();
        let batches = shuffled_batches(entries.clone(), 2);

        let sizes: Vec<_> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, [2, 2, 1]);

        let seen: HashSet<_> = batches.concat().into_iter().map(|e| e.base_url).collect();
        assert_eq!(seen.len(), 5);
    }

    #[tokio::test]
    async fn test_failing_source_is_excluded_and_persisted() {
        let tmp = TempDir::new().unwrap();
        let config = tmp.path().join("config.yml");
        std::fs::write(&config, CONFIG).unwrap();
        let archive_dir = tmp.path().join("archive");

        let store = Arc::new(YamlSourceStore::new(&config));
        let extractor = Arc::new(StubExtractor::new(2).failing_build("https://bad.test"));
        let (_tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store.clone(), Arc::clone(&extractor), &archive_dir, rx);

        // Default threshold is 5, so the sixth failure trips.
        for _ in 0..6 {
            scheduler.run_cycle().await;
            scheduler.cycle.advance();
        }
        assert!(scheduler.tracker().is_broken("https://bad.test"));
        assert_eq!(extractor.builds_of("https://bad.test"), 6);

        let yaml = std::fs::read_to_string(&config).unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc["news_sources"]["Bad"]["failed"], serde_yaml::Value::Bool(true));
        assert!(doc["news_sources"]["Good"].get("failed").is_none());
        assert_eq!(doc["settings"]["max_workers"].as_u64(), Some(2));

        for _ in 0..3 {
            let report = scheduler.run_cycle().await;
            assert_eq!(report.totals.sources_attempted, 1);
            scheduler.cycle.advance();
        }
        assert_eq!(extractor.builds_of("https://bad.test"), 6);
        assert_eq!(extractor.builds_of("https://good.test"), 9);

        let month = archive_dir.join("good/2024/06");
        assert!(month.join("2024-06-18 Headline story-1.json").is_file());
        assert!(month.join("2024-06-18 Headline story-2.json").is_file());
        assert!(!archive_dir.join("bad").exists());
    }

    #[tokio::test]
    async fn test_memo_cleared_only_on_first_cycle() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_sources(&[("A", "https://a.test"), ("B", "https://b.test")]));
        let extractor = Arc::new(StubExtractor::new(1));
        let (_tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store, Arc::clone(&extractor), tmp.path(), rx);

        for _ in 0..3 {
            scheduler.run_cycle().await;
            scheduler.cycle.advance();
        }
        assert_eq!(extractor.cleared.lock().unwrap().len(), 2);
        assert_eq!(extractor.build_attempts.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_reload_failure_reuses_last_known_list() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_sources(&[("A", "https://a.test")]));
        let extractor = Arc::new(StubExtractor::new(1));
        let (_tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store.clone(), Arc::clone(&extractor), tmp.path(), rx);

        scheduler.run_cycle().await;
        store.fail_loads.store(true, Ordering::SeqCst);
        let report = scheduler.run_cycle().await;

        assert_eq!(report.totals.sources_built, 1);
        assert_eq!(extractor.builds_of("https://a.test"), 2);
    }

    #[tokio::test]
    async fn test_seeded_sources_used_when_first_read_fails() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::default());
        store.fail_loads.store(true, Ordering::SeqCst);
        let extractor = Arc::new(StubExtractor::new(1));
        let (_tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store, Arc::clone(&extractor), tmp.path(), rx)
            .with_sources(vec![entry(1)]);

        let report = scheduler.run_cycle().await;

        assert_eq!(report.totals.sources_built, 1);
        assert_eq!(extractor.builds_of("https://s1.test"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sources_backs_off_between_cycles() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::default());
        let extractor = Arc::new(StubExtractor::new(1));
        let (tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store, extractor, tmp.path(), rx);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.send(true).unwrap();
        });

        assert_eq!(scheduler.run(false).await, 1);
        stopper.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_backoff_retries_after_a_minute() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::default());
        let extractor = Arc::new(StubExtractor::new(1));
        let (tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store, extractor, tmp.path(), rx);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            tx.send(true).unwrap();
        });

        // Cycles at 0s, 60s and 120s.
        assert_eq!(scheduler.run(false).await, 3);
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_once_runs_one_cycle() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_sources(&[("A", "https://a.test")]));
        let extractor = Arc::new(StubExtractor::new(1));
        let (_tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store, Arc::clone(&extractor), tmp.path(), rx);

        assert_eq!(scheduler.run(true).await, 1);
        assert_eq!(extractor.builds_of("https://a.test"), 1);
        assert_eq!(scheduler.cycle().ordinal, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_before_next_batch() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_sources(&[("A", "https://a.test"), ("B", "https://b.test")]));
        let extractor = Arc::new(StubExtractor::new(1));
        let (tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store, Arc::clone(&extractor), tmp.path(), rx);

        tx.send(true).unwrap();
        let report = scheduler.run_cycle().await;
        assert!(report.interrupted);
        assert_eq!(report.batches, 0);

        assert_eq!(scheduler.run(false).await, 0);
        assert!(extractor.build_attempts.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_wait_between_cycles() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::with_sources(&[("A", "https://a.test")]));
        let extractor = Arc::new(StubExtractor::new(0));
        let (tx, rx) = watch::channel(false);
        let mut scheduler = scheduler(store, Arc::clone(&extractor), tmp.path(), rx);
        scheduler.settings.cycle_interval_secs = 3600;

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            tx.send(true).unwrap();
        });

        assert_eq!(scheduler.run(false).await, 1);
        stopper.await.unwrap();
    }
}
