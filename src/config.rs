use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::DocCategory;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Upstream DIP-style document API.
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// API key sent as the `apikey` query parameter. May also be supplied
    /// via the `PLENUM_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_page_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Texts per embedding request; bounded by provider limits and
    /// independent of the listing page size.
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_embed_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_embed_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Points per upsert request.
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_upsert_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Chunks shorter than this (after cleaning) are discarded as noise.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    /// Hard maximum; longer chunks are re-split on sentence boundaries.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Soft cap for the fixed-size paragraph fallback.
    #[serde(default = "default_fallback_chars")]
    pub fallback_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            fallback_chars: default_fallback_chars(),
        }
    }
}

fn default_min_chars() -> usize {
    50
}
fn default_max_chars() -> usize {
    6000
}
fn default_fallback_chars() -> usize {
    3500
}

/// Crawl scope and batching.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Electoral terms (Wahlperioden) to index.
    pub terms: Vec<u32>,
    /// Document categories to index.
    pub categories: Vec<DocCategory>,
    /// Listing items per existence-check/index batch.
    #[serde(default = "default_index_batch_size")]
    pub batch_size: usize,
    /// Minutes subtracted from the watermark timestamp in incremental
    /// mode to tolerate upstream indexing lag.
    #[serde(default = "default_overlap_minutes")]
    pub overlap_minutes: i64,
    /// Seconds to pause the current (term, category) loop after the
    /// upstream signals rate limiting.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_index_batch_size() -> usize {
    25
}
fn default_overlap_minutes() -> i64 {
    20
}
fn default_cooldown_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResilienceConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_retry_cap_ms")]
    pub retry_cap_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub breaker_failure_threshold: u32,
    #[serde(default = "default_reset_timeout_secs")]
    pub breaker_reset_timeout_secs: u64,
    #[serde(default = "default_half_open_max")]
    pub breaker_half_open_max_requests: u32,
    #[serde(default = "default_half_open_successes")]
    pub breaker_half_open_successes: u32,
    /// Sustained request rate against the source API, per second.
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: f64,
    #[serde(default = "default_burst")]
    pub rate_burst: f64,
    #[serde(default = "default_max_wait_secs")]
    pub rate_max_wait_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_cap_ms: default_retry_cap_ms(),
            breaker_failure_threshold: default_failure_threshold(),
            breaker_reset_timeout_secs: default_reset_timeout_secs(),
            breaker_half_open_max_requests: default_half_open_max(),
            breaker_half_open_successes: default_half_open_successes(),
            rate_per_sec: default_rate_per_sec(),
            rate_burst: default_burst(),
            rate_max_wait_secs: default_max_wait_secs(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_retry_cap_ms() -> u64 {
    10_000
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_reset_timeout_secs() -> u64 {
    30
}
fn default_half_open_max() -> u32 {
    3
}
fn default_half_open_successes() -> u32 {
    2
}
fn default_rate_per_sec() -> f64 {
    2.0
}
fn default_burst() -> f64 {
    5.0
}
fn default_max_wait_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl ApiConfig {
    /// Resolve the API key from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("PLENUM_API_KEY").ok())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.min_chars == 0 {
        anyhow::bail!("chunking.min_chars must be > 0");
    }
    if config.chunking.max_chars <= config.chunking.min_chars {
        anyhow::bail!("chunking.max_chars must be > chunking.min_chars");
    }
    if config.chunking.fallback_chars > config.chunking.max_chars {
        anyhow::bail!("chunking.fallback_chars must be <= chunking.max_chars");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    if config.indexing.terms.is_empty() {
        anyhow::bail!("indexing.terms must list at least one electoral term");
    }
    if config.indexing.categories.is_empty() {
        anyhow::bail!("indexing.categories must list at least one category");
    }
    if config.indexing.batch_size == 0 {
        anyhow::bail!("indexing.batch_size must be > 0");
    }

    if config.resilience.rate_per_sec <= 0.0 {
        anyhow::bail!("resilience.rate_per_sec must be > 0");
    }
    if config.resilience.rate_burst < 1.0 {
        anyhow::bail!("resilience.rate_burst must be >= 1");
    }
    if config.resilience.breaker_failure_threshold == 0 {
        anyhow::bail!("resilience.breaker_failure_threshold must be > 0");
    }

    Ok(config)
}
