//! Crawl pipeline.
//!
//! - `scheduler`: cycles and batches (`Scheduler`)
//! - `crawl`: build and extraction phases of one batch
//! - `pool`: bounded worker pool shared by both phases
//! - `circuit_breaker`: sliding-window failure tracking
//! - `download`: one-off bulk download of a URL list

pub mod circuit_breaker;
pub mod crawl;
pub mod download;
pub mod pool;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use circuit_breaker::{CircuitBreakerConfig, FailureTracker, FailureVerdict};
pub use crawl::{CrawlContext, crawl_batch};
pub use download::{download_articles, read_url_list};
pub use pool::{PoolBatch, TaskOutcome, WorkerPool};
pub use scheduler::Scheduler;
