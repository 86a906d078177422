//! YAML-backed source store.
//!
//! The configuration file doubles as the durable record of circuit-broken
//! sources. Rewrites go through a read-modify-write of the whole document
//! under one lock, so unrelated keys and their order survive and two
//! concurrent circuit breaks cannot lose each other's update.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_yaml::{Mapping, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{SourceEntry, parse_source_entries};
use crate::storage::SourceStore;

const SOURCES_KEY: &str = "news_sources";

/// Source store reading and rewriting a YAML configuration file.
#[derive(Debug)]
pub struct YamlSourceStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlSourceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Value> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_yaml::from_str(&content)?)
    }

    async fn write_document(&self, doc: &Value) -> Result<()> {
        let yaml = serde_yaml::to_string(doc)?;
        let tmp = self.path.with_extension("yml.tmp");

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(yaml.as_bytes()).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn sources_mapping(doc: &Value) -> Mapping {
        doc.get(SOURCES_KEY)
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default()
    }
}

/// Flag every entry of `sources` whose `base_url` equals `url`.
fn flag_failed(sources: &mut Mapping, url: &str) -> bool {
    let mut matched = false;
    for (_, entry) in sources.iter_mut() {
        let Some(fields) = entry.as_mapping_mut() else {
            continue;
        };
        let is_match = fields
            .get("base_url")
            .and_then(Value::as_str)
            .is_some_and(|u| u.trim() == url);
        if is_match {
            fields.insert(Value::from("failed"), Value::Bool(true));
            matched = true;
        }
    }
    matched
}

#[async_trait]
impl SourceStore for YamlSourceStore {
    async fn load_sources(&self) -> Result<Vec<SourceEntry>> {
        let doc = self.read_document().await?;
        parse_source_entries(&Self::sources_mapping(&doc))
    }

    async fn mark_failed(&self, url: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut doc = self
            .read_document()
            .await
            .map_err(|e| AppError::config_persistence(url, e))?;

        let matched = match doc.get_mut(SOURCES_KEY).and_then(Value::as_mapping_mut) {
            Some(sources) => flag_failed(sources, url),
            None => false,
        };

        if !matched {
            log::warn!("No news_sources entry with base_url {url} to flag");
            return Ok(false);
        }

        self.write_document(&doc)
            .await
            .map_err(|e| AppError::config_persistence(url, e))?;
        log::info!("Flagged {url} as failed in {}", self.path.display());
        Ok(true)
    }
}
