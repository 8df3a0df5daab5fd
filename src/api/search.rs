//! Torrent search client
//!
//! Queries the RARBG-style JSON search proxy and returns torrent results
//! with magnet links. The provider has been observed to return its columns
//! shifted by one; [`FieldLayout`] decides how the raw fields are read.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::{SearchConfig, DEFAULT_SEARCH_ENDPOINT};
use crate::models::{SearchPage, TorrentResult};

/// Search API error types
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search request failed with HTTP {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// How the provider's raw columns map onto our result fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLayout {
    /// Raw `seeds` holds the size, `leech` the seeds, `size` the leechers
    /// and the date
    #[default]
    Shifted,
    /// Fields mean what they are named
    Verbatim,
}

impl FieldLayout {
    fn map(self, raw: RawResult) -> TorrentResult {
        match self {
            FieldLayout::Shifted => TorrentResult {
                name: raw.name,
                detail_url: raw.detail_url,
                size: raw.seeds,
                seeds: raw.leech,
                leech: raw.size.clone(),
                magnet: raw.magnet,
                date: Some(raw.size),
            },
            FieldLayout::Verbatim => TorrentResult {
                name: raw.name,
                detail_url: raw.detail_url,
                size: raw.size,
                seeds: raw.seeds,
                leech: raw.leech,
                magnet: raw.magnet,
                date: raw.date,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: String,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default, deserialize_with = "optional_count")]
    limit: Option<u32>,
    #[serde(rename = "totalPages", default)]
    total_pages: u32,
    #[serde(default)]
    results: Vec<RawResult>,
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RawResult {
    name: String,
    #[serde(rename = "detailUrl", default)]
    detail_url: String,
    #[serde(default, deserialize_with = "string_or_number")]
    size: String,
    #[serde(default, deserialize_with = "string_or_number")]
    seeds: String,
    #[serde(default, deserialize_with = "string_or_number")]
    leech: String,
    magnet: String,
    #[serde(default)]
    date: Option<String>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Field::deserialize(deserializer)? {
        Field::Text(s) => s,
        Field::Number(n) => n.to_string(),
    })
}

/// Page size as either a number or a numeric string
fn optional_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<LenientCount> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|count| count.0.trim().parse().ok()))
}

struct LenientCount(String);

impl<'de> Deserialize<'de> for LenientCount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        string_or_number(deserializer).map(LenientCount)
    }
}

/// Torrent search client
pub struct SearchClient {
    endpoint: String,
    layout: FieldLayout,
    client: reqwest::Client,
}

impl SearchClient {
    /// Create a client for the default endpoint
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_SEARCH_ENDPOINT, FieldLayout::default())
    }

    /// Create a client from settings
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::with_endpoint(config.endpoint.clone(), config.field_layout)
    }

    /// Create a client with a custom endpoint (for testing)
    pub fn with_endpoint(endpoint: impl Into<String>, layout: FieldLayout) -> Self {
        Self {
            endpoint: endpoint.into(),
            layout,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn layout(&self) -> FieldLayout {
        self.layout
    }

    /// Search one page of results
    pub async fn search(&self, query: &str, page: u32) -> Result<SearchPage, SearchError> {
        let page = page.max(1);
        let page_str = page.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("page", page_str.as_str())])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let data: SearchResponse = serde_json::from_str(&text)
            .map_err(|e| SearchError::InvalidResponse(format!("JSON parse error: {}", e)))?;

        debug!(query, page, results = data.results.len(), "search page fetched");

        let layout = self.layout;
        Ok(SearchPage {
            query: if data.query.is_empty() {
                query.to_string()
            } else {
                data.query
            },
            page: data.page,
            limit: data.limit,
            total_pages: data.total_pages,
            results: data.results.into_iter().map(|r| layout.map(r)).collect(),
        })
    }
}

impl Default for SearchClient {
    fn default() -> Self {
        Self::new()
    }
}
