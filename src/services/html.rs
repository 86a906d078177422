//! HTML article extractor.
//!
//! Discovers article links on a source's home page and pulls article fields
//! out of common metadata (Open Graph, schema.org, plain `<meta>` tags).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Article, Settings, Source};
use crate::services::{ArticleExtractor, MemoCache};
use crate::utils::{parse_publish_date, resolve_url, same_site};

/// Path segments that mark listing or account pages rather than articles.
const EXCLUDED_SEGMENTS: &[&str] = &[
    "tag", "tags", "topic", "topics", "author", "authors", "category", "categories",
    "section", "login", "signin", "signup", "register", "account", "subscribe",
    "newsletter", "newsletters", "search", "about", "contact", "privacy", "terms",
    "cookies", "help", "feed", "rss",
];

/// File extensions never treated as articles.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".pdf", ".xml", ".css", ".js", ".zip",
];

/// Meta tags carrying a publish date, most specific first.
const DATE_SELECTORS: &[(&str, &str)] = &[
    ("meta[property='article:published_time']", "content"),
    ("meta[itemprop='datePublished']", "content"),
    ("[itemprop='datePublished']", "datetime"),
    ("meta[name='pubdate']", "content"),
    ("meta[name='publishdate']", "content"),
    ("meta[name='date']", "content"),
    ("time[datetime]", "datetime"),
];

/// Extractor backed by reqwest and scraper.
pub struct HtmlExtractor {
    client: Client,
    memo: Option<MemoCache>,
}

impl HtmlExtractor {
    /// Build the HTTP client from settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let language = HeaderValue::from_str(&settings.language).map_err(|e| {
            AppError::config(format!("invalid language '{}': {e}", settings.language))
        })?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .default_headers(headers)
            .build()?;

        let memo = settings
            .memoize_articles
            .then(|| MemoCache::new(&settings.cache_dir));

        Ok(Self { client, memo })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ArticleExtractor for HtmlExtractor {
    async fn build(&self, source: &Source) -> Result<Vec<String>> {
        let base = Url::parse(&source.url).map_err(|e| AppError::source_build(&source.url, e))?;
        let html = self
            .fetch(&source.url)
            .await
            .map_err(|e| AppError::source_build(&source.url, e))?;

        let links = collect_article_links(&base, &html)?;
        if links.is_empty() {
            return Err(AppError::source_build(&source.url, "no article links found"));
        }
        log::debug!("{}: {} candidate articles", source.name, links.len());

        match &self.memo {
            Some(memo) => memo
                .filter_new(&source.url, links)
                .await
                .map_err(|e| AppError::source_build(&source.url, format!("memo cache: {e}"))),
            None => Ok(links),
        }
    }

    async fn extract(&self, url: &str) -> Result<Article> {
        let html = self
            .fetch(url)
            .await
            .map_err(|e| AppError::extraction(url, e))?;
        parse_article(url, &html)
    }

    async fn clear_cache(&self, source: &Source) -> Result<()> {
        match &self.memo {
            Some(memo) => memo.clear(&source.url).await,
            None => Ok(()),
        }
    }
}

/// Whether `candidate` looks like an article on the same site as `base`.
pub fn is_article_url(base: &Url, candidate: &Url) -> bool {
    if !matches!(candidate.scheme(), "http" | "https") {
        return false;
    }
    if !same_site(base.as_str(), candidate.as_str()) {
        return false;
    }

    let segments: Vec<String> = candidate
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_lowercase).collect())
        .unwrap_or_default();

    let Some(last) = segments.last() else {
        return false;
    };
    if EXCLUDED_EXTENSIONS.iter().any(|ext| last.ends_with(ext)) {
        return false;
    }
    if segments.iter().any(|s| EXCLUDED_SEGMENTS.contains(&s.as_str())) {
        return false;
    }

    let has_number = segments.iter().any(|s| s.chars().any(|c| c.is_ascii_digit()));
    segments.len() >= 2 || has_number
}

/// Article links found in a page, resolved and deduplicated in page order.
pub fn collect_article_links(base: &Url, html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let anchor = parse_selector("a[href]")?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = Url::parse(&resolve_url(base, href.trim())) else {
            continue;
        };
        url.set_fragment(None);

        if url.as_str() == base.as_str() || !is_article_url(base, &url) {
            continue;
        }
        let link = url.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }
    Ok(links)
}

/// Parse an article page.
///
/// A page without a title or without body text is an extraction error.
pub fn parse_article(url: &str, html: &str) -> Result<Article> {
    let document = Html::parse_document(html);
    let base = Url::parse(url).map_err(|e| AppError::extraction(url, e))?;

    let title = meta_content(&document, "meta[property='og:title']")?
        .or(first_text(&document, "title")?)
        .or(first_text(&document, "h1")?)
        .unwrap_or_default();
    if title.is_empty() {
        return Err(AppError::extraction(url, "no title"));
    }

    let text = body_text(&document)?;
    if text.is_empty() {
        return Err(AppError::extraction(url, "no body text"));
    }

    let mut publish_date = None;
    for (css, attr) in DATE_SELECTORS {
        let selector = parse_selector(css)?;
        publish_date = document
            .select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .find_map(parse_publish_date);
        if publish_date.is_some() {
            break;
        }
    }

    let mut authors: Vec<String> = Vec::new();
    for css in ["meta[name='author']", "meta[property='article:author']"] {
        let selector = parse_selector(css)?;
        for el in document.select(&selector) {
            let Some(name) = el.value().attr("content").map(str::trim) else {
                continue;
            };
            if !name.is_empty() && !name.starts_with("http") && !authors.iter().any(|a| a == name) {
                authors.push(name.to_string());
            }
        }
    }

    let top_image = meta_content(&document, "meta[property='og:image']")?
        .map(|src| resolve_url(&base, &src))
        .unwrap_or_default();

    let mut movies = Vec::new();
    let video = parse_selector("video[src], video source[src], iframe[src]")?;
    for el in document.select(&video) {
        let Some(src) = el.value().attr("src") else {
            continue;
        };
        let is_player = el.value().name() != "iframe"
            || ["youtube", "vimeo", "dailymotion"].iter().any(|p| src.contains(p));
        let src = resolve_url(&base, src);
        if is_player && !movies.contains(&src) {
            movies.push(src);
        }
    }

    let keywords = meta_content(&document, "meta[name='keywords']")?
        .map(|k| {
            k.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let summary = meta_content(&document, "meta[name='description']")?
        .or(meta_content(&document, "meta[property='og:description']")?)
        .unwrap_or_default();

    let meta_site_name = meta_content(&document, "meta[property='og:site_name']")?.unwrap_or_default();

    Ok(Article {
        title,
        text,
        publish_date,
        authors,
        top_image,
        movies,
        keywords,
        summary,
        meta_site_name,
    })
}

/// Paragraphs inside `<article>`, falling back to the whole body.
fn body_text(document: &Html) -> Result<String> {
    for css in ["article p", "body p"] {
        let selector = parse_selector(css)?;
        let paragraphs: Vec<String> = document
            .select(&selector)
            .map(element_text)
            .filter(|p| !p.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            return Ok(paragraphs.join("\n\n"));
        }
    }
    Ok(String::new())
}

fn meta_content(document: &Html, css: &str) -> Result<Option<String>> {
    let selector = parse_selector(css)?;
    Ok(document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty()))
}

fn first_text(document: &Html, css: &str) -> Result<Option<String>> {
    let selector = parse_selector(css)?;
    Ok(document
        .select(&selector)
        .map(element_text)
        .find(|t| !t.is_empty()))
}

/// Element text with whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::validation(format!("bad selector '{s}': {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HOME: &str = r#"<html><body>
        <a href="/2024/06/18/markets/rates-decision/index.html">Rates</a>
        <a href="/2024/06/18/markets/rates-decision/index.html#comments">Rates again</a>
        <a href="https://edition.cnn.com/world/europe/story-123">Europe</a>
        <a href="/tag/politics">Politics tag</a>
        <a href="/author/jane-doe">Jane</a>
        <a href="/about">About</a>
        <a href="/">Home</a>
        <a href="https://www.other.test/2024/06/18/story">Elsewhere</a>
        <a href="/media/photo-1.jpg">Photo</a>
        <a href="mailto:tips@cnn.com">Tips</a>
    </body></html>"#;

    const ARTICLE: &str = r#"<html><head>
        <title>Fallback title | CNN</title>
        <meta property="og:title" content="Rates: what next?">
        <meta property="og:site_name" content="CNN">
        <meta property="og:image" content="/img/rates.jpg">
        <meta property="article:published_time" content="2024-06-18T07:30:00Z">
        <meta name="author" content="Jane Doe">
        <meta name="keywords" content="rates, fed , economy">
        <meta name="description" content="The Fed holds.">
    </head><body>
        <nav><p>Menu</p></nav>
        <article>
            <p>First   paragraph.</p>
            <p></p>
            <p>Second paragraph.</p>
            <video src="/v/clip.mp4"></video>
            <iframe src="https://www.youtube.com/embed/abc"></iframe>
            <iframe src="https://ads.test/frame"></iframe>
        </article>
    </body></html>"#;

    #[test]
    fn test_collect_article_links() {
        let base = Url::parse("https://www.cnn.com").unwrap();
        let links = collect_article_links(&base, HOME).unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.cnn.com/2024/06/18/markets/rates-decision/index.html".to_string(),
                "https://edition.cnn.com/world/europe/story-123".to_string(),
            ]
        );
    }

    #[test]
    fn test_is_article_url() {
        let base = Url::parse("https://www.bbc.co.uk").unwrap();
        let check = |u: &str| is_article_url(&base, &Url::parse(u).unwrap());

        assert!(check("https://www.bbc.co.uk/news/world-12345"));
        assert!(check("https://www.bbc.co.uk/news/uk/politics"));
        assert!(!check("https://www.bbc.co.uk/news"));
        assert!(!check("https://www.bbc.co.uk/topics/economy"));
        assert!(!check("https://www.cnn.com/news/world-12345"));
    }

    #[test]
    fn test_parse_article_metadata() {
        let article = parse_article("https://www.cnn.com/2024/06/18/rates", ARTICLE).unwrap();

        assert_eq!(article.title, "Rates: what next?");
        assert_eq!(article.text, "First paragraph.\n\nSecond paragraph.");
        assert_eq!(
            article.publish_date,
            NaiveDate::from_ymd_opt(2024, 6, 18).and_then(|d| d.and_hms_opt(7, 30, 0))
        );
        assert_eq!(article.authors, vec!["Jane Doe"]);
        assert_eq!(article.top_image, "https://www.cnn.com/img/rates.jpg");
        assert_eq!(
            article.movies,
            vec!["https://www.cnn.com/v/clip.mp4", "https://www.youtube.com/embed/abc"]
        );
        assert_eq!(article.keywords, vec!["rates", "fed", "economy"]);
        assert_eq!(article.summary, "The Fed holds.");
        assert_eq!(article.meta_site_name, "CNN");
    }

    #[test]
    fn test_title_falls_back_to_title_tag() {
        let html = "<html><head><title> Plain  title </title></head>\
                    <body><p>Only text.</p></body></html>";
        let article = parse_article("https://news.test/a/1", html).unwrap();
        assert_eq!(article.title, "Plain title");
        assert_eq!(article.text, "Only text.");
        assert!(article.publish_date.is_none());
    }

    #[test]
    fn test_page_without_body_is_extraction_error() {
        let html = "<html><head><title>Empty</title></head><body></body></html>";
        let err = parse_article("https://news.test/a/1", html).unwrap_err();
        assert!(matches!(err, AppError::ArticleExtraction { .. }));
        assert!(err.is_source_failure());
    }

    #[test]
    fn test_extractor_builds_from_settings() {
        let settings = Settings::new("/tmp/archive");
        assert!(HtmlExtractor::new(&settings).is_ok());
    }
}
