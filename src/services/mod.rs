//! Service layer for the crawler application.
//!
//! The scheduler never parses HTML itself. It talks to an
//! [`ArticleExtractor`], which discovers article locations for a source and
//! turns one location into an [`Article`]:
//! - `HtmlExtractor`: bundled reqwest + scraper implementation
//! - `MemoCache`: per-source record of article URLs already handed out

mod html;
mod memo;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Article, Source};

pub use html::{HtmlExtractor, collect_article_links, is_article_url, parse_article};
pub use memo::MemoCache;

/// Boundary to the article extraction library.
#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    /// Discover the article locations of a source.
    ///
    /// Errors are `SourceBuild` failures and count against the source.
    async fn build(&self, source: &Source) -> Result<Vec<String>>;

    /// Download and parse one article.
    async fn extract(&self, url: &str) -> Result<Article>;

    /// Forget which articles of `source` were already handed out.
    async fn clear_cache(&self, source: &Source) -> Result<()>;
}
