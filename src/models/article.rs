//! Article data structure.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An extracted article.
///
/// Field order matches the keys written to the archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub title: String,

    pub text: String,

    /// Serialized as an ISO-8601 string or `null`
    pub publish_date: Option<NaiveDateTime>,

    pub authors: Vec<String>,

    pub top_image: String,

    /// Embedded video URLs
    pub movies: Vec<String>,

    pub keywords: Vec<String>,

    pub summary: String,

    pub meta_site_name: String,
}
