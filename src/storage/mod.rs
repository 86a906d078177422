//! Storage abstractions.
//!
//! Two stores are involved in a crawl:
//!
//! - the **archive**, where each extracted article becomes one JSON file
//!   under a date-partitioned path (see [`paths`]);
//! - the **source store**, the `news_sources` section of the configuration
//!   file, re-read every cycle and rewritten when a source is circuit-broken.
//!
//! ## Archive Layout
//!
//! ```text
//! {base_archive_dir}/
//! └── {brand}/
//!     ├── 2024/
//!     │   └── 06/
//!     │       └── 2024-06-18 Some headline.json
//!     └── 0/
//!         └── 0/
//!             └── 00-00 Undated headline.json
//! ```

pub mod local;
pub mod lookup;
pub mod paths;
pub mod sources;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Article, SourceEntry};

// Re-export for convenience
pub use local::{LocalArchive, resolve_archive_dir};
pub use lookup::find_articles_by_date;
pub use paths::{
    ArchivePath, date_prefix, derive_archive_path, ensure_directory, month_directory, sanitize_title,
};
pub use sources::YamlSourceStore;

/// Trait for article archive backends.
#[async_trait]
pub trait ArticleArchive: Send + Sync {
    /// Write one article below its source's brand folder.
    ///
    /// Returns the path written. An existing file at the same path is replaced.
    async fn save(&self, brand: &str, article: &Article) -> Result<PathBuf>;
}

/// Durable list of configured sources.
///
/// A single writer: implementations serialize `mark_failed` calls.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Read every configured source, in file order.
    async fn load_sources(&self) -> Result<Vec<SourceEntry>>;

    /// Set `failed: true` on the entry whose `base_url` matches.
    ///
    /// Returns `false` when no entry matched.
    async fn mark_failed(&self, url: &str) -> Result<bool>;
}
