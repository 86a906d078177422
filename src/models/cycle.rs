//! Cycle bookkeeping and batch reports.

use std::fmt;

/// Position of the scheduler in its run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cycle {
    pub ordinal: u64,
    /// Only true for the first cycle of the process
    pub first_run: bool,
}

impl Cycle {
    pub fn new() -> Self {
        Self {
            ordinal: 1,
            first_run: true,
        }
    }

    pub fn advance(&mut self) {
        self.ordinal += 1;
        self.first_run = false;
    }
}

impl Default for Cycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub sources_attempted: usize,
    pub sources_built: usize,
    pub build_failures: usize,
    pub articles_saved: usize,
    pub extraction_failures: usize,
    pub persistence_failures: usize,
    /// Articles not attempted because their source was circuit-broken
    pub articles_skipped: usize,
    pub circuit_broken: Vec<String>,
}

/// Counters for a full pass over all batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub ordinal: u64,
    pub batches: usize,
    pub totals: BatchReport,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
}

impl CycleReport {
    pub fn new(ordinal: u64) -> Self {
        Self {
            ordinal,
            ..Self::default()
        }
    }

    /// Fold a batch into the cycle totals.
    pub fn absorb(&mut self, batch: BatchReport) {
        let t = &mut self.totals;
        t.sources_attempted += batch.sources_attempted;
        t.sources_built += batch.sources_built;
        t.build_failures += batch.build_failures;
        t.articles_saved += batch.articles_saved;
        t.extraction_failures += batch.extraction_failures;
        t.persistence_failures += batch.persistence_failures;
        t.articles_skipped += batch.articles_skipped;
        t.circuit_broken.extend(batch.circuit_broken);
        self.batches += 1;
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.totals;
        write!(
            f,
            "cycle {}: {} batches, {}/{} sources built, {} articles saved, \
             {} extraction failures, {} write failures, {} skipped, {} circuit-broken",
            self.ordinal,
            self.batches,
            t.sources_built,
            t.sources_attempted,
            t.articles_saved,
            t.extraction_failures,
            t.persistence_failures,
            t.articles_skipped,
            t.circuit_broken.len()
        )
    }
}
