// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod article;
mod config;
mod cycle;
mod source;

// Re-export all public types
pub use article::Article;
pub use config::{Config, FilenameFlavor, LoggingConfig, MAX_FAILURE_WINDOW_HOURS, Settings};
pub use cycle::{BatchReport, Cycle, CycleReport};
pub use source::{BuildStatus, Source, SourceEntry, SourceState, parse_source_entries};
