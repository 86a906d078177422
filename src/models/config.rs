//! Application configuration structures.
//!
//! The configuration file is a YAML document with three top-level keys:
//! `logging` (optional), `settings` and `news_sources`. Only `settings` and
//! `logging` are typed here; `news_sources` is kept as an ordered mapping so
//! that entries can be re-read every cycle (see [`crate::storage::sources`]).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::source::{SourceEntry, parse_source_entries};

/// Longest accepted failure window (ten years).
pub const MAX_FAILURE_WINDOW_HOURS: u64 = 24 * 365 * 10;

/// Root application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level and optional log file
    pub logging: LoggingConfig,

    /// Crawl settings
    pub settings: Settings,

    /// Configured news sources, in file order
    pub news_sources: Vec<SourceEntry>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    logging: LoggingConfig,
    settings: Option<Settings>,
    #[serde(default)]
    news_sources: Option<serde_yaml::Mapping>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        let settings = raw
            .settings
            .ok_or_else(|| AppError::config("missing `settings` section"))?;
        let news_sources = parse_source_entries(&raw.news_sources.unwrap_or_default())?;

        Ok(Self {
            logging: raw.logging,
            settings,
            news_sources,
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()?;
        if self.news_sources.is_empty() {
            return Err(AppError::validation("No news sources defined"));
        }
        Ok(())
    }

    /// Sources not flagged as failed.
    pub fn active_sources(&self) -> impl Iterator<Item = &SourceEntry> {
        self.news_sources.iter().filter(|s| !s.failed)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global level filter (`error`, `warn`, `info`, `debug`, `trace`)
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Optional file to append log lines to, in addition to stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            file: None,
        }
    }
}

/// OS filename-restriction flavor used when sanitizing article titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilenameFlavor {
    /// Strips `<>:"/\|?*`, trims trailing dots/spaces, caps at 255 chars
    Windows,
    /// Strips `<>:"/\|?*'`
    Posix,
}

impl FilenameFlavor {
    /// Flavor matching the platform the binary was compiled for.
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// Crawl settings, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root of the date-partitioned archive
    pub base_archive_dir: PathBuf,

    /// Stop after a single cycle
    #[serde(default)]
    pub run_once: bool,

    /// Concurrent builds/extractions
    #[serde(default = "defaults::max_workers")]
    pub max_workers: usize,

    /// Sources built and crawled together
    #[serde(default = "defaults::sources_per_batch")]
    pub sources_per_batch: usize,

    /// Failures tolerated inside the window before a source is excised
    #[serde(default = "defaults::failed_source_threshold")]
    pub failed_source_threshold: usize,

    /// Length of the trailing failure window
    #[serde(default = "defaults::failure_time_window_hours")]
    pub failure_time_window_hours: u64,

    /// Article language, sent as `Accept-Language`
    #[serde(default = "defaults::language")]
    pub language: String,

    /// Pause between cycles in continuous mode
    #[serde(default)]
    pub cycle_interval_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "defaults::request_timeout")]
    pub request_timeout_secs: u64,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Only hand out article URLs not seen by an earlier build
    #[serde(default = "defaults::memoize_articles")]
    pub memoize_articles: bool,

    /// Directory holding the article memo cache
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: PathBuf,

    /// Overrides the platform filename flavor
    #[serde(default)]
    pub filename_flavor: Option<FilenameFlavor>,
}

impl Settings {
    /// Settings with every optional value at its default.
    pub fn new(base_archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_archive_dir: base_archive_dir.into(),
            run_once: false,
            max_workers: defaults::max_workers(),
            sources_per_batch: defaults::sources_per_batch(),
            failed_source_threshold: defaults::failed_source_threshold(),
            failure_time_window_hours: defaults::failure_time_window_hours(),
            language: defaults::language(),
            cycle_interval_secs: 0,
            request_timeout_secs: defaults::request_timeout(),
            user_agent: defaults::user_agent(),
            memoize_articles: defaults::memoize_articles(),
            cache_dir: defaults::cache_dir(),
            filename_flavor: None,
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.base_archive_dir.as_os_str().is_empty() {
            return Err(AppError::validation("settings.base_archive_dir is empty"));
        }
        if self.max_workers == 0 {
            return Err(AppError::validation("settings.max_workers must be > 0"));
        }
        if self.sources_per_batch == 0 {
            return Err(AppError::validation(
                "settings.sources_per_batch must be > 0",
            ));
        }
        if self.failed_source_threshold == 0 {
            return Err(AppError::validation(
                "settings.failed_source_threshold must be > 0",
            ));
        }
        if self.failure_time_window_hours == 0 {
            return Err(AppError::validation(
                "settings.failure_time_window_hours must be > 0",
            ));
        }
        if self.failure_time_window_hours > MAX_FAILURE_WINDOW_HOURS {
            return Err(AppError::validation(format!(
                "settings.failure_time_window_hours must be <= {MAX_FAILURE_WINDOW_HOURS}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::validation(
                "settings.request_timeout_secs must be > 0",
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AppError::validation("settings.user_agent is empty"));
        }
        Ok(())
    }

    /// The trailing failure window as a duration.
    ///
    /// Clamped to [`MAX_FAILURE_WINDOW_HOURS`] for settings that skipped
    /// validation.
    pub fn failure_window(&self) -> TimeDelta {
        let hours = self.failure_time_window_hours.min(MAX_FAILURE_WINDOW_HOURS);
        TimeDelta::try_hours(hours as i64).unwrap_or(TimeDelta::MAX)
    }

    /// Effective filename flavor.
    pub fn flavor(&self) -> FilenameFlavor {
        self.filename_flavor.unwrap_or_else(FilenameFlavor::native)
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn max_workers() -> usize {
        5
    }
    pub fn sources_per_batch() -> usize {
        2
    }
    pub fn failed_source_threshold() -> usize {
        5
    }
    pub fn failure_time_window_hours() -> u64 {
        24
    }
    pub fn language() -> String {
        "en".into()
    }

    pub fn request_timeout() -> u64 {
        30
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; news-crawler/0.1)".into()
    }
    pub fn memoize_articles() -> bool {
        true
    }
    pub fn cache_dir() -> PathBuf {
        PathBuf::from(".cache/news-crawler")
    }
}
