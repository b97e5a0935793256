//! Item model definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A listing as reported by a fetch, before deduplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Identifier assigned by the listings site
    pub id: String,
    pub title: String,
    pub url: String,
    /// Free-form price text, kept exactly as the source renders it
    #[serde(default)]
    pub price: String,
    /// Relative publication time text ("5 minutes ago" and similar)
    #[serde(default)]
    pub published_at: Option<String>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            price: String::new(),
            published_at: None,
        }
    }

    /// Set the price text
    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }
}

/// A seen-listing record. Unique per `(task_id, source_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub task_id: Uuid,
    pub source_id: String,
    pub title: String,
    pub url: String,
    pub price: String,
    pub published_at: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl Item {
    pub fn from_candidate(task_id: Uuid, candidate: &Candidate, observed_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            source_id: candidate.id.clone(),
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            price: candidate.price.clone(),
            published_at: candidate.published_at.clone(),
            observed_at,
        }
    }
}

/// Strip the query string and fragment from a listing URL.
///
/// Listing links carry tracking parameters that change between page loads;
/// the bare path is the stable address of a listing.
pub fn normalize_listing_url(url: &str) -> &str {
    let end = url.find(&['?', '#'][..]).unwrap_or(url.len());
    &url[..end]
}

/// Derive the source identifier of a listing from its URL: the run of digits
/// at the end of the path (`.../flat_2_rooms_4312345678` -> `4312345678`).
pub fn listing_id_from_url(url: &str) -> Option<&str> {
    let path = normalize_listing_url(url).trim_end_matches('/');
    let digits = path
        .bytes()
        .rev()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    Some(&path[path.len() - digits..])
}
