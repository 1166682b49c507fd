//! Upstream document source.
//!
//! [`DocumentSource`] is the seam the orchestrator crawls through: a
//! cursor-paginated listing per (category, electoral term) and a
//! full-text lookup per item. [`DipClient`] implements it against a
//! DIP-style REST API and composes the resilience stack around every
//! request: rate limiter first, then retry, with each attempt running
//! under the circuit breaker.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::{ApiConfig, ResilienceConfig};
use crate::error::PipelineError;
use crate::models::{DocCategory, DocMetadata, SourceDocument};
use crate::resilience::{CircuitBreaker, RateLimiter, RetryPolicy};

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub documents: Vec<SourceDocument>,
    /// Opaque cursor for the next page; `None` ends the loop.
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch one listing page. Ordering must be stable across cursors
    /// within a pass.
    async fn list_page(
        &self,
        category: DocCategory,
        term: u32,
        updated_since: Option<DateTime<Utc>>,
        cursor: Option<&str>,
    ) -> Result<ListingPage, PipelineError>;

    /// Fetch the full text for one item. Absence is not an error.
    async fn full_text(
        &self,
        category: DocCategory,
        id: &str,
    ) -> Result<Option<String>, PipelineError>;
}

/// HTTP client for the DIP-style parliamentary document API.
pub struct DipClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_size: usize,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl DipClient {
    pub fn new(api: &ApiConfig, resilience: &ResilienceConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        // Expected 404s (e.g. items without a text document) must not
        // trip the breaker.
        let breaker = CircuitBreaker::new(resilience.breaker_config())
            .with_failure_predicate(Box::new(|e| matches!(e, PipelineError::Transient(_))));
        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_key: api.resolve_api_key(),
            page_size: api.page_size,
            limiter: RateLimiter::new(resilience.limiter_config()),
            breaker,
            retry: resilience.retry_policy(),
        })
    }

    /// One protected GET returning parsed JSON.
    async fn get_json(&self, url: &str, query: &[(String, String)]) -> Result<Value, PipelineError> {
        self.limiter.acquire().await?;
        self.retry
            .run(url, || {
                self.breaker.call(|| async {
                    let response = self
                        .http
                        .get(url)
                        .query(query)
                        .send()
                        .await
                        .map_err(PipelineError::from)?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(PipelineError::from_status(status, url));
                    }
                    response
                        .json::<Value>()
                        .await
                        .map_err(|e| PipelineError::Permanent(format!("{}: {}", url, e)))
                })
            })
            .await
    }

    fn base_query(&self, term: u32, updated_since: Option<DateTime<Utc>>) -> Vec<(String, String)> {
        let mut query = vec![
            ("f.wahlperiode".to_string(), term.to_string()),
            ("rows".to_string(), self.page_size.to_string()),
            ("format".to_string(), "json".to_string()),
        ];
        if let Some(since) = updated_since {
            query.push((
                "f.aktualisiert.start".to_string(),
                since.format("%Y-%m-%dT%H:%M:%S").to_string(),
            ));
        }
        if let Some(key) = &self.api_key {
            query.push(("apikey".to_string(), key.clone()));
        }
        query
    }
}

#[async_trait]
impl DocumentSource for DipClient {
    async fn list_page(
        &self,
        category: DocCategory,
        term: u32,
        updated_since: Option<DateTime<Utc>>,
        cursor: Option<&str>,
    ) -> Result<ListingPage, PipelineError> {
        let url = format!("{}/{}", self.base_url, category.api_filter());
        let mut query = self.base_query(term, updated_since);
        if let Some(c) = cursor {
            query.push(("cursor".to_string(), c.to_string()));
        }

        let json = self.get_json(&url, &query).await?;
        let documents = json
            .get("documents")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| parse_listing_item(item, category))
                    .collect()
            })
            .unwrap_or_default();

        // The upstream repeats the same cursor on the final page.
        let next_cursor = json
            .get("cursor")
            .and_then(Value::as_str)
            .filter(|&c| Some(c) != cursor && !c.is_empty())
            .map(str::to_string);

        debug!(category = %category, term, count = json
            .get("documents")
            .and_then(serde_json::Value::as_array)
            .map_or(0, Vec::len), "listing page fetched");

        Ok(ListingPage {
            documents,
            next_cursor,
        })
    }

    async fn full_text(
        &self,
        category: DocCategory,
        id: &str,
    ) -> Result<Option<String>, PipelineError> {
        let endpoint = match category {
            DocCategory::Transcript => "plenarprotokoll-text",
            _ => "drucksache-text",
        };
        let url = format!("{}/{}/{}", self.base_url, endpoint, id);
        let mut query = Vec::new();
        if let Some(key) = &self.api_key {
            query.push(("apikey".to_string(), key.clone()));
        }
        query.push(("format".to_string(), "json".to_string()));

        match self.get_json(&url, &query).await {
            Ok(json) => Ok(json
                .get("text")
                .and_then(Value::as_str)
                .filter(|t| !t.trim().is_empty())
                .map(str::to_string)),
            // A missing text document is normal for some items.
            Err(PipelineError::Permanent(msg)) if msg.contains("404") => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Map one listing-item JSON object to a [`SourceDocument`].
///
/// Items without an id are dropped; every other field is optional.
fn parse_listing_item(item: &Value, category: DocCategory) -> Option<SourceDocument> {
    let id = item.get("id").and_then(Value::as_str)?.to_string();
    let metadata = DocMetadata {
        term: item
            .get("wahlperiode")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        date: item
            .get("datum")
            .and_then(Value::as_str)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        number: item
            .get("dokumentnummer")
            .and_then(Value::as_str)
            .map(str::to_string),
        title: item
            .get("titel")
            .and_then(Value::as_str)
            .map(str::to_string),
        issuer: item
            .get("herausgeber")
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    let text = item
        .get("text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string);
    Some(SourceDocument {
        id,
        category,
        metadata,
        text,
    })
}
