//! Fetching candidate listings for a task URL

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use lw_core::item::{listing_id_from_url, normalize_listing_url, Candidate};

use crate::error::{Result, SchedulerError};

/// Retrieves the current listings behind a URL.
///
/// Results are best effort: a fetch may return a partial page or fail.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<Candidate>>;
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    url: &'a str,
}

/// One listing as reported by the extraction worker
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedListing {
    #[serde(default)]
    id: Option<String>,
    title: String,
    url: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    items: Vec<ExtractedListing>,
}

/// Client for an extraction worker (a headless browser service) exposing
/// `POST {base_url}/extract`
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            // Disable proxy for internal worker communication
            .no_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| SchedulerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<Candidate>> {
        let res = self
            .client
            .post(format!("{}/extract", self.base_url))
            .json(&ExtractRequest { url })
            .send()
            .await
            .map_err(|e| SchedulerError::fetch_with_source("Failed to reach extraction worker", e))?;

        if !res.status().is_success() {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            return Err(SchedulerError::fetch(format!(
                "Extraction worker returned {}: {}",
                status, error_text
            )));
        }

        let body: ExtractResponse = res
            .json()
            .await
            .map_err(|e| SchedulerError::fetch_with_source("Malformed extraction response", e))?;

        let candidates = into_candidates(body.items);
        debug!(url, count = candidates.len(), "Fetched listings");
        Ok(candidates)
    }
}

/// Normalize worker output: strip tracking parameters from links and derive
/// missing ids from the link. Listings without a usable id are dropped.
fn into_candidates(listings: Vec<ExtractedListing>) -> Vec<Candidate> {
    listings
        .into_iter()
        .filter_map(|listing| {
            let url = normalize_listing_url(&listing.url).to_string();
            let id = listing
                .id
                .filter(|id| !id.trim().is_empty())
                .or_else(|| listing_id_from_url(&url).map(str::to_string));
            let Some(id) = id else {
                warn!(url = %listing.url, "Skipping listing without an id");
                return None;
            };
            Some(Candidate {
                id,
                title: listing.title,
                url,
                price: listing.price.unwrap_or_default(),
                published_at: listing.published_at,
            })
        })
        .collect()
}
