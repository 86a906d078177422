//! Test doubles shared by the pipeline tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::models::{Article, Source, SourceEntry};
use crate::services::ArticleExtractor;
use crate::storage::SourceStore;

/// Extractor returning canned articles, with configurable failures.
#[derive(Default)]
pub(crate) struct StubExtractor {
    pub articles_per_source: usize,
    pub failing_builds: HashSet<String>,
    pub failing_articles: HashSet<String>,
    pub build_attempts: Mutex<Vec<String>>,
    pub extract_attempts: Mutex<Vec<String>>,
    pub cleared: Mutex<Vec<String>>,
}

impl StubExtractor {
    pub fn new(articles_per_source: usize) -> Self {
        Self {
            articles_per_source,
            ..Self::default()
        }
    }

    pub fn failing_build(mut self, url: &str) -> Self {
        self.failing_builds.insert(url.to_string());
        self
    }

    pub fn failing_article(mut self, url: &str) -> Self {
        self.failing_articles.insert(url.to_string());
        self
    }

    pub fn builds_of(&self, url: &str) -> usize {
        self.build_attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == url)
            .count()
    }
}

#[async_trait]
impl ArticleExtractor for StubExtractor {
    async fn build(&self, source: &Source) -> Result<Vec<String>> {
        self.build_attempts.lock().unwrap().push(source.url.clone());
        if self.failing_builds.contains(&source.url) {
            return Err(AppError::source_build(&source.url, "connection refused"));
        }
        let root = source.url.trim_end_matches('/');
        Ok((1..=self.articles_per_source)
            .map(|i| format!("{root}/2024/06/story-{i}"))
            .collect())
    }

    async fn extract(&self, url: &str) -> Result<Article> {
        self.extract_attempts.lock().unwrap().push(url.to_string());
        if self.failing_articles.contains(url) {
            return Err(AppError::extraction(url, "parse error"));
        }
        let slug = url.rsplit('/').next().unwrap_or("story");
        Ok(Article {
            title: format!("Headline {slug}"),
            text: "Body".to_string(),
            publish_date: NaiveDate::from_ymd_opt(2024, 6, 18).and_then(|d| d.and_hms_opt(8, 0, 0)),
            ..Article::default()
        })
    }

    async fn clear_cache(&self, source: &Source) -> Result<()> {
        self.cleared.lock().unwrap().push(source.url.clone());
        Ok(())
    }
}

/// Source store kept in memory.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub entries: Mutex<Vec<SourceEntry>>,
    pub fail_loads: AtomicBool,
}

impl MemoryStore {
    pub fn with_sources(sources: &[(&str, &str)]) -> Self {
        let entries = sources
            .iter()
            .map(|(name, url)| SourceEntry {
                name: name.to_string(),
                base_url: url.to_string(),
                failed: false,
            })
            .collect();
        Self {
            entries: Mutex::new(entries),
            fail_loads: AtomicBool::new(false),
        }
    }

    pub fn is_flagged(&self, url: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.base_url == url && e.failed)
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn load_sources(&self) -> Result<Vec<SourceEntry>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(AppError::config("config.yml is being edited"));
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn mark_failed(&self, url: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        let mut matched = false;
        for entry in entries.iter_mut().filter(|e| e.base_url == url) {
            entry.failed = true;
            matched = true;
        }
        Ok(matched)
    }
}
