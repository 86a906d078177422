//! Circuit Breaker pattern implementation.
//!
//! Excises chronically failing sources for the rest of the run.
//!
//! Every build or extraction failure is timestamped against its source URL.
//! On each write the record is pruned to the trailing window; when more than
//! `threshold` failures remain, the source is circuit-broken: removed from
//! the in-memory active set at once and flagged `failed` in the durable
//! source store.
//!
//! Successes do not reset a record. Failures only leave the window by aging
//! out of it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};

use crate::models::Settings;
use crate::storage::SourceStore;

/// Attempts at writing the `failed` flag before giving up.
const PERSIST_ATTEMPTS: usize = 2;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures tolerated inside the window. Default: 5
    pub threshold: usize,
    /// Trailing window. Default: 24h
    pub window: TimeDelta,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            window: TimeDelta::hours(24),
        }
    }
}

impl From<&Settings> for CircuitBreakerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            threshold: settings.failed_source_threshold,
            window: settings.failure_window(),
        }
    }
}

/// Timestamps of recent failures for one source, oldest first.
#[derive(Debug, Default, Clone)]
pub struct FailureRecord {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl FailureRecord {
    /// Drop everything outside `[now - window, now]`.
    pub fn prune(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.timestamps.retain(|t| *t >= cutoff && *t <= now);
    }

    /// Append `now`, prune, and return the remaining count.
    pub fn push(&mut self, now: DateTime<Utc>, window: TimeDelta) -> usize {
        self.timestamps.push_back(now);
        self.prune(now, window);
        self.timestamps.len()
    }

    fn len(&self) -> usize {
        self.timestamps.len()
    }
}

/// Result of recording a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Still under the threshold
    Recorded { failures: usize },
    /// This failure crossed the threshold; the source is now broken
    Tripped { failures: usize },
    /// The source was broken earlier; nothing recorded
    AlreadyBroken,
}

/// Per-source sliding-window failure tracker.
///
/// The outer map lock is held only to find or create a source's record;
/// updates to one record are serialized by that record's own lock, so
/// different sources never wait on each other.
pub struct FailureTracker {
    config: CircuitBreakerConfig,
    records: Mutex<HashMap<String, Arc<Mutex<FailureRecord>>>>,
    broken: Mutex<HashSet<String>>,
    store: Arc<dyn SourceStore>,
}

impl FailureTracker {
    /// Create a tracker persisting circuit breaks to `store`.
    pub fn new(config: CircuitBreakerConfig, store: Arc<dyn SourceStore>) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
            broken: Mutex::new(HashSet::new()),
            store,
        }
    }

    /// Record a failure for `url` now.
    pub async fn record_failure(&self, url: &str) -> FailureVerdict {
        self.record_failure_at(url, Utc::now()).await
    }

    /// Record a failure for `url` at `now`.
    pub async fn record_failure_at(&self, url: &str, now: DateTime<Utc>) -> FailureVerdict {
        if self.is_broken(url) {
            return FailureVerdict::AlreadyBroken;
        }

        let record = self.record_for(url);
        let failures = {
            let mut record = record.lock().unwrap_or_else(PoisonError::into_inner);
            record.push(now, self.config.window)
        };

        if failures <= self.config.threshold {
            log::debug!(
                "Failure {}/{} within window for {}",
                failures,
                self.config.threshold,
                url
            );
            return FailureVerdict::Recorded { failures };
        }

        if self.circuit_break(url).await {
            FailureVerdict::Tripped { failures }
        } else {
            FailureVerdict::AlreadyBroken
        }
    }

    /// Remove `url` from the active set and flag it in the source store.
    ///
    /// Returns `true` only for the call that performed the transition. The
    /// in-memory removal holds even if the store cannot be written.
    pub async fn circuit_break(&self, url: &str) -> bool {
        let newly_broken = self
            .broken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string());
        if !newly_broken {
            return false;
        }

        log::error!(
            "Circuit breaker: TRIPPED for {} (> {} failures in {}h), excluding it",
            url,
            self.config.threshold,
            self.config.window.num_hours()
        );

        for attempt in 1..=PERSIST_ATTEMPTS {
            match self.store.mark_failed(url).await {
                Ok(true) => break,
                Ok(false) => {
                    log::warn!("Circuit breaker: {url} not found in source store");
                    break;
                }
                Err(e) if attempt < PERSIST_ATTEMPTS => {
                    log::warn!("Circuit breaker: persisting {url} failed, retrying: {e}");
                }
                Err(e) => {
                    log::error!(
                        "Circuit breaker: could not persist {url}, excluded for this run only: {e}"
                    );
                }
            }
        }
        true
    }

    /// Whether `url` has been circuit-broken during this run.
    pub fn is_broken(&self, url: &str) -> bool {
        self.broken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    /// Failures currently held for `url` (as of its last write).
    pub fn failure_count(&self, url: &str) -> usize {
        let record = {
            let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            records.get(url).cloned()
        };
        record.map_or(0, |r| r.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    /// URLs broken so far, sorted.
    pub fn broken_sources(&self) -> Vec<String> {
        let mut urls: Vec<String> = self
            .broken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        urls.sort();
        urls
    }

    fn record_for(&self, url: &str) -> Arc<Mutex<FailureRecord>> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(records.entry(url.to_string()).or_default())
    }
}
