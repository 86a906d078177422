// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A source could not be built (home page unreachable, no links, ...)
    #[error("Source build failed for {url}: {message}")]
    SourceBuild { url: String, message: String },

    /// A single article could not be downloaded or parsed
    #[error("Article extraction failed for {url}: {message}")]
    ArticleExtraction { url: String, message: String },

    /// An extracted article could not be written to the archive
    #[error("Failed to persist {path}: {message}")]
    Persistence { path: String, message: String },

    /// The `failed` flag of a source could not be written back
    #[error("Failed to persist circuit break for {url}: {message}")]
    ConfigPersistence { url: String, message: String },

    /// Worker pool failure (task aborted or pool closed)
    #[error("Worker pool error: {0}")]
    Pool(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a source build error.
    pub fn source_build(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::SourceBuild {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an article extraction error.
    pub fn extraction(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ArticleExtraction {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a persistence error for an archive path.
    pub fn persistence(path: &Path, message: impl fmt::Display) -> Self {
        Self::Persistence {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a config persistence error.
    pub fn config_persistence(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ConfigPersistence {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a worker pool error.
    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool(message.into())
    }

    /// Whether this error counts against a source's failure window.
    pub fn is_source_failure(&self) -> bool {
        matches!(
            self,
            Self::SourceBuild { .. }
                | Self::ArticleExtraction { .. }
                | Self::Http(_)
                | Self::Url(_)
                | Self::Pool(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_errors_do_not_count_against_sources() {
        let err = AppError::persistence(Path::new("/tmp/a.json"), "disk full");
        assert!(!err.is_source_failure());
        assert_eq!(err.to_string(), "Failed to persist /tmp/a.json: disk full");

        let io = AppError::from(std::io::Error::other("memo cache unreadable"));
        assert!(!io.is_source_failure());
    }

    #[test]
    fn build_and_extraction_errors_count_against_sources() {
        assert!(AppError::source_build("https://a.test", "timeout").is_source_failure());
        assert!(AppError::extraction("https://a.test/x", "no title").is_source_failure());
    }
}
