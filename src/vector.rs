//! Vector store abstraction.
//!
//! [`VectorStore`] covers exactly the operations the pipeline needs:
//! idempotent upsert by point key, existence checks by id, a payload
//! scroll for the watermark bootstrap, and collection management.
//! [`QdrantStore`] implements it against the Qdrant REST API;
//! [`InMemoryStore`] backs orchestrator and bootstrap tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::config::QdrantConfig;
use crate::error::PipelineError;
use crate::models::Point;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection with the given dimensionality if missing.
    async fn ensure_collection(&self, dims: usize) -> Result<(), PipelineError>;

    /// Insert-or-replace points by id. Idempotent: re-upserting the
    /// same id merges, never duplicates.
    async fn upsert(&self, points: &[Point]) -> Result<(), PipelineError>;

    /// Which of the given ids already exist. No payloads fetched.
    async fn existing_ids(&self, ids: &[u64]) -> Result<HashSet<u64>, PipelineError>;

    /// Page through stored payloads; returns the page and the offset
    /// for the next one. Used by the watermark bootstrap scan.
    async fn scroll_payloads(
        &self,
        offset: Option<u64>,
        limit: usize,
    ) -> Result<(Vec<Value>, Option<u64>), PipelineError>;

    async fn count(&self) -> Result<u64, PipelineError>;
}

// ============ Qdrant REST ============

pub struct QdrantStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl QdrantStore {
    pub fn new(config: &QdrantConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder, context: &str) -> Result<Value, PipelineError> {
        let response = req.send().await.map_err(PipelineError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::from_status(status, context));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| PipelineError::Permanent(format!("{}: {}", context, e)))
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dims: usize) -> Result<(), PipelineError> {
        let path = format!("/collections/{}", self.collection);
        let probe = self
            .request(reqwest::Method::GET, &path)
            .send()
            .await
            .map_err(PipelineError::from)?;
        if probe.status().is_success() {
            return Ok(());
        }
        if probe.status().as_u16() != 404 {
            return Err(PipelineError::from_status(probe.status(), "collection probe"));
        }

        info!(collection = %self.collection, dims, "creating vector collection");
        let body = json!({
            "vectors": { "size": dims, "distance": "Cosine" }
        });
        self.send(
            self.request(reqwest::Method::PUT, &path).json(&body),
            "collection create",
        )
        .await?;
        Ok(())
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), PipelineError> {
        if points.is_empty() {
            return Ok(());
        }
        let path = format!("/collections/{}/points?wait=true", self.collection);
        let body = json!({
            "points": points
                .iter()
                .map(|p| json!({ "id": p.id, "vector": p.vector, "payload": p.payload }))
                .collect::<Vec<_>>()
        });
        self.send(
            self.request(reqwest::Method::PUT, &path).json(&body),
            "points upsert",
        )
        .await?;
        Ok(())
    }

    async fn existing_ids(&self, ids: &[u64]) -> Result<HashSet<u64>, PipelineError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let path = format!("/collections/{}/points", self.collection);
        let body = json!({
            "ids": ids,
            "with_payload": false,
            "with_vector": false,
        });
        let json = self
            .send(
                self.request(reqwest::Method::POST, &path).json(&body),
                "points retrieve",
            )
            .await?;
        let found = json
            .get("result")
            .and_then(Value::as_array)
            .map(|points| {
                points
                    .iter()
                    .filter_map(|p| p.get("id").and_then(Value::as_u64))
                    .collect()
            })
            .unwrap_or_default();
        Ok(found)
    }

    async fn scroll_payloads(
        &self,
        offset: Option<u64>,
        limit: usize,
    ) -> Result<(Vec<Value>, Option<u64>), PipelineError> {
        let path = format!("/collections/{}/points/scroll", self.collection);
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        if let Some(off) = offset {
            body["offset"] = json!(off);
        }
        let json = self
            .send(
                self.request(reqwest::Method::POST, &path).json(&body),
                "points scroll",
            )
            .await?;
        let result = json.get("result").cloned().unwrap_or_default();
        let payloads = result
            .get("points")
            .and_then(Value::as_array)
            .map(|points| {
                points
                    .iter()
                    .filter_map(|p| p.get("payload").cloned())
                    .collect()
            })
            .unwrap_or_default();
        let next = result.get("next_page_offset").and_then(Value::as_u64);
        Ok((payloads, next))
    }

    async fn count(&self) -> Result<u64, PipelineError> {
        let path = format!("/collections/{}/points/count", self.collection);
        let json = self
            .send(
                self.request(reqwest::Method::POST, &path)
                    .json(&json!({ "exact": true })),
                "points count",
            )
            .await?;
        Ok(json
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}

// ============ In-memory (tests) ============

/// Brute-force in-memory store. `BTreeMap` keeps scroll order stable.
#[derive(Default)]
pub struct InMemoryStore {
    points: Mutex<BTreeMap<u64, Point>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point(&self, id: u64) -> Option<Point> {
        self.points.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn ensure_collection(&self, _dims: usize) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn upsert(&self, points: &[Point]) -> Result<(), PipelineError> {
        let mut stored = self.points.lock().unwrap();
        for p in points {
            stored.insert(p.id, p.clone());
        }
        Ok(())
    }

    async fn existing_ids(&self, ids: &[u64]) -> Result<HashSet<u64>, PipelineError> {
        let stored = self.points.lock().unwrap();
        Ok(ids.iter().copied().filter(|id| stored.contains_key(id)).collect())
    }

    async fn scroll_payloads(
        &self,
        offset: Option<u64>,
        limit: usize,
    ) -> Result<(Vec<Value>, Option<u64>), PipelineError> {
        let stored = self.points.lock().unwrap();
        let start = offset.unwrap_or(0);
        let page: Vec<(u64, Value)> = stored
            .range(start..)
            .take(limit)
            .map(|(id, p)| (*id, p.payload.clone()))
            .collect();
        let next = if page.len() == limit {
            page.last().and_then(|(id, _)| id.checked_add(1))
        } else {
            None
        };
        Ok((page.into_iter().map(|(_, v)| v).collect(), next))
    }

    async fn count(&self) -> Result<u64, PipelineError> {
        Ok(self.points.lock().unwrap().len() as u64)
    }
}
