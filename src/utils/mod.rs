//! Utility functions and helpers.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use url::Url;

/// Second-level labels that sit under a country code (`bbc.co.uk`).
const COMPOUND_SUFFIXES: &[&str] = &["co", "com", "org", "net", "gov", "ac", "edu"];

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Registrable name of a site, used as its archive folder.
///
/// `https://edition.cnn.com` gives `cnn`, `https://www.bbc.co.uk` gives `bbc`.
pub fn brand_from_url(url_str: &str) -> Option<String> {
    let host = get_domain(url_str)?;
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();

    let brand = match labels.as_slice() {
        [] => return None,
        [only] => *only,
        [.., third, second, tld]
            if tld.len() == 2 && COMPOUND_SUFFIXES.contains(second) =>
        {
            *third
        }
        [.., second, _tld] => *second,
    };
    Some(brand.to_string())
}

/// Whether two URLs share a registrable name.
pub fn same_site(a: &str, b: &str) -> bool {
    match (brand_from_url(a), brand_from_url(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Parse a publish date as found in article metadata.
///
/// Accepts RFC 3339, RFC 2822 and a handful of common naive layouts.
/// Timezone offsets are dropped; the local wall-clock time is kept.
pub fn parse_publish_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.naive_local());
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%d %B %Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}
