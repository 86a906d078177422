//! News source model and its per-run state.

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::utils::brand_from_url;

/// A `news_sources` entry as stored in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Key of the entry (display name)
    pub name: String,

    /// Site root to build from
    pub base_url: String,

    /// Excluded from crawling after a circuit break
    pub failed: bool,
}

#[derive(Deserialize)]
struct EntryFields {
    base_url: String,
    #[serde(default)]
    failed: bool,
}

/// Parse the `news_sources` mapping, keeping file order.
pub fn parse_source_entries(mapping: &serde_yaml::Mapping) -> Result<Vec<SourceEntry>> {
    mapping
        .iter()
        .map(|(key, value)| {
            let name = match key {
                serde_yaml::Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other)?.trim().to_string(),
            };
            let fields: EntryFields = serde_yaml::from_value(value.clone()).map_err(|e| {
                AppError::validation(format!("news_sources.{name}: {e}"))
            })?;
            if fields.base_url.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "news_sources.{name}: base_url is empty"
                )));
            }
            Ok(SourceEntry {
                name,
                base_url: fields.base_url.trim().to_string(),
                failed: fields.failed,
            })
        })
        .collect()
}

/// Circuit state of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Active,
    /// Terminal for the run
    CircuitBroken,
}

/// Progress of a source within the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    NotBuilt,
    Built,
    /// Every discovered article was attempted
    Drained,
    BuildFailed,
}

/// A crawlable site root together with its discovered article locations.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub url: String,
    /// Archive folder name, derived from the host
    pub brand: String,
    pub state: SourceState,
    pub status: BuildStatus,
    pub article_urls: Vec<String>,
}

impl Source {
    /// Create a fresh, unbuilt source handle.
    pub fn new(entry: &SourceEntry) -> Self {
        let brand = brand_from_url(&entry.base_url).unwrap_or_else(|| {
            entry
                .name
                .to_lowercase()
                .replace(|c: char| !c.is_alphanumeric(), "")
        });

        Self {
            name: entry.name.clone(),
            url: entry.base_url.clone(),
            brand,
            state: SourceState::Active,
            status: BuildStatus::NotBuilt,
            article_urls: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SourceState::Active
    }

    /// Record a successful build.
    pub fn mark_built(&mut self, article_urls: Vec<String>) {
        self.article_urls = article_urls;
        self.status = BuildStatus::Built;
    }

    pub fn mark_build_failed(&mut self) {
        self.article_urls.clear();
        self.status = BuildStatus::BuildFailed;
    }

    /// All discovered articles have been attempted.
    pub fn mark_drained(&mut self) {
        if self.status == BuildStatus::Built {
            self.status = BuildStatus::Drained;
        }
    }

    pub fn circuit_break(&mut self) {
        self.state = SourceState::CircuitBroken;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, url: &str) -> SourceEntry {
        SourceEntry {
            name: name.to_string(),
            base_url: url.to_string(),
            failed: false,
        }
    }

    #[test]
    fn brand_comes_from_host() {
        let source = Source::new(&entry("CNN", "https://edition.cnn.com"));
        assert_eq!(source.brand, "cnn");
        assert_eq!(source.status, BuildStatus::NotBuilt);
        assert!(source.is_active());
    }

    #[test]
    fn brand_falls_back_to_name() {
        let source = Source::new(&entry("The Daily", "not a url"));
        assert_eq!(source.brand, "thedaily");
    }

    #[test]
    fn build_lifecycle() {
        let mut source = Source::new(&entry("CNN", "https://www.cnn.com"));
        source.mark_built(vec!["https://www.cnn.com/2024/06/18/a".into()]);
        assert_eq!(source.status, BuildStatus::Built);
        source.mark_drained();
        assert_eq!(source.status, BuildStatus::Drained);

        let mut failed = Source::new(&entry("X", "https://x.test"));
        failed.mark_build_failed();
        failed.mark_drained();
        assert_eq!(failed.status, BuildStatus::BuildFailed);
    }

    #[test]
    fn parse_rejects_entry_without_url() {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str("Broken: { failed: false }").unwrap();
        assert!(parse_source_entries(&mapping).is_err());
    }

    #[test]
    fn parse_defaults_failed_to_false() {
        let mapping: serde_yaml::Mapping =
            serde_yaml::from_str("CNN: { base_url: 'https://www.cnn.com' }").unwrap();
        let entries = parse_source_entries(&mapping).unwrap();
        assert_eq!(entries, vec![entry("CNN", "https://www.cnn.com")]);
    }
}
