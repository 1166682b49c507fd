//! Embedding provider abstraction.
//!
//! [`EmbeddingProvider`] turns an ordered batch of texts into an
//! ordered batch of vectors. The shipped implementation calls an
//! OpenAI-compatible `/embeddings` endpoint; retry is applied by the
//! caller via [`crate::resilience::RetryPolicy`], keeping the provider
//! itself a single-attempt client.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. The response has one vector per input,
    /// in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Vector dimensionality (e.g. 1536).
    fn dims(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// OpenAI-compatible embeddings client.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            dims: config.dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(PipelineError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::from_status(status, "embeddings"));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::Permanent(format!("embeddings: {}", e)))?;
        let vectors = parse_embedding_response(&json)?;
        if vectors.len() != texts.len() {
            return Err(PipelineError::Permanent(format!(
                "embeddings: got {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Extract `data[].embedding` in index order.
fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>, PipelineError> {
    let data = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::Permanent("embeddings: missing data array".to_string()))?;

    let mut entries: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .map_or(pos, |i| i as usize);
        let embedding = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                PipelineError::Permanent("embeddings: missing embedding field".to_string())
            })?;
        let vector = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        entries.push((index, vector));
    }
    entries.sort_by_key(|(i, _)| *i);
    Ok(entries.into_iter().map(|(_, v)| v).collect())
}
