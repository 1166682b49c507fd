//! Crawl/index orchestration.
//!
//! [`Indexer`] drives one pass at a time over every configured
//! (electoral term, document category) pair: page through the source
//! listing, skip items whose deterministic point keys already exist,
//! fetch full text for the rest, segment, embed in batches, upsert in
//! batches, and finally move the pair's watermark to the pass start
//! time.
//!
//! Failure isolation, from smallest to largest blast radius:
//! - an item whose text cannot be fetched is counted and skipped;
//! - a failed embed/upsert batch is counted and the page loop continues;
//! - a failed listing page aborts only the current (term, category)
//!   loop, and its watermark is left untouched;
//! - upstream rate limiting pauses the current loop for a fixed
//!   cooldown, then the same unit of work is resumed.
//!
//! A pass never aborts entirely because of a single item or batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::{Config, IndexingConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::PipelineError;
use crate::identity::point_key;
use crate::models::{Chunk, DocCategory, PassMode, PassReport, Point, SourceDocument};
use crate::resilience::RetryPolicy;
use crate::segment::Segmenter;
use crate::source::DocumentSource;
use crate::vector::VectorStore;
use crate::watermark::WatermarkStore;

/// Returned when a pass is requested while one is already running.
/// Requests are rejected, never queued.
#[derive(Debug, thiserror::Error)]
#[error("an indexing pass is already running")]
pub struct PassRejected;

#[derive(Default)]
struct Counters {
    indexed: u64,
    skipped: u64,
    errors: u64,
}

pub struct Indexer {
    source: Arc<dyn DocumentSource>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    watermarks: Arc<WatermarkStore>,
    segmenter: Arc<dyn Segmenter>,
    indexing: IndexingConfig,
    embed_batch_size: usize,
    upsert_batch_size: usize,
    /// Retry alone (no breaker/limiter) around embedding and
    /// vector-store calls.
    retry: RetryPolicy,
    running: AtomicBool,
    stopping: AtomicBool,
    report: RwLock<PassReport>,
}

impl Indexer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &Config,
        source: Arc<dyn DocumentSource>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        watermarks: Arc<WatermarkStore>,
        segmenter: Arc<dyn Segmenter>,
    ) -> Self {
        Self {
            source,
            embedder,
            store,
            watermarks,
            segmenter,
            indexing: config.indexing.clone(),
            embed_batch_size: config.embedding.batch_size,
            upsert_batch_size: config.qdrant.upsert_batch_size,
            retry: config.resilience.retry_policy(),
            running: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            report: RwLock::new(PassReport::default()),
        }
    }

    /// Last-run (or currently-running) statistics.
    pub fn report(&self) -> PassReport {
        self.report.read().unwrap().clone()
    }

    /// Stop accepting new batches; in-flight network calls finish.
    pub fn request_stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    fn stopped(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn try_acquire(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Run one complete pass. Rejects (does not queue) if a pass is
    /// already running.
    pub async fn run_pass(&self) -> Result<PassReport, PassRejected> {
        if !self.try_acquire() {
            return Err(PassRejected);
        }
        Ok(self.execute_pass().await)
    }

    /// Start a pass on a background task; the accept/reject decision is
    /// made synchronously so callers can answer immediately.
    pub fn start_background(self: &Arc<Self>) -> Result<(), PassRejected> {
        if !self.try_acquire() {
            return Err(PassRejected);
        }
        let indexer = Arc::clone(self);
        tokio::spawn(async move {
            indexer.execute_pass().await;
        });
        Ok(())
    }

    /// The pass body. The running flag must already be held.
    async fn execute_pass(&self) -> PassReport {
        let pass_start = Utc::now();
        let mut counters = Counters::default();
        let mut any_incremental = false;
        let mut any_full = false;

        {
            let mut report = self.report.write().unwrap();
            *report = PassReport {
                running: true,
                started_at: Some(pass_start),
                ..Default::default()
            };
        }

        for &term in &self.indexing.terms {
            for &category in &self.indexing.categories {
                if self.stopped() {
                    break;
                }
                match self.run_pair(term, category, pass_start, &mut counters).await {
                    Ok(incremental) => {
                        any_incremental |= incremental;
                        any_full |= !incremental;
                    }
                    Err(err) => {
                        // Pair aborted; the rest of the pass continues.
                        counters.errors += 1;
                        error!(term, category = %category, %err, "pair loop aborted");
                    }
                }
                self.publish(&counters, None);
            }
        }

        let finished = Utc::now();
        let mode = match (any_full, any_incremental) {
            (true, true) => PassMode::Mixed,
            (false, true) => PassMode::Incremental,
            _ => PassMode::Full,
        };
        let report = PassReport {
            running: false,
            mode: Some(mode),
            started_at: Some(pass_start),
            finished_at: Some(finished),
            duration_secs: Some((finished - pass_start).num_seconds()),
            indexed: counters.indexed,
            skipped: counters.skipped,
            errors: counters.errors,
        };
        *self.report.write().unwrap() = report.clone();

        self.running.store(false, Ordering::SeqCst);
        info!(
            indexed = counters.indexed,
            skipped = counters.skipped,
            errors = counters.errors,
            mode = ?mode,
            "pass finished"
        );
        report
    }

    fn publish(&self, counters: &Counters, mode: Option<PassMode>) {
        let mut report = self.report.write().unwrap();
        report.indexed = counters.indexed;
        report.skipped = counters.skipped;
        report.errors = counters.errors;
        if mode.is_some() {
            report.mode = mode;
        }
    }

    /// Crawl one (term, category) pair. Returns whether the pair ran
    /// incrementally. An error here means the listing failed and the
    /// pair was aborted; the watermark is then left untouched.
    async fn run_pair(
        &self,
        term: u32,
        category: DocCategory,
        pass_start: DateTime<Utc>,
        counters: &mut Counters,
    ) -> Result<bool> {
        let watermark = self.watermarks.get(term, category).await?;
        let lower_bound = watermark.as_ref().map(|w| {
            w.last_indexed_at - chrono::Duration::minutes(self.indexing.overlap_minutes)
        });
        let incremental = lower_bound.is_some();
        info!(
            term,
            category = %category,
            mode = if incremental { "incremental" } else { "full" },
            "pair crawl starting"
        );

        let indexed_before = counters.indexed;
        let mut cursor: Option<String> = None;
        let mut cooled_down = false;

        loop {
            if self.stopped() {
                break;
            }
            let page = match self
                .source
                .list_page(category, term, lower_bound, cursor.as_deref())
                .await
            {
                Ok(page) => {
                    cooled_down = false;
                    page
                }
                Err(PipelineError::RateLimited) if !cooled_down => {
                    warn!(term, category = %category, "upstream rate limit; cooling down");
                    tokio::time::sleep(Duration::from_secs(self.indexing.cooldown_secs)).await;
                    cooled_down = true;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if page.documents.is_empty() && page.next_cursor.is_none() {
                break;
            }

            for batch in page.documents.chunks(self.indexing.batch_size) {
                if self.stopped() {
                    break;
                }
                // Snapshot so a retried batch does not double-count the
                // per-item tallies from its first attempt.
                let snapshot = (counters.indexed, counters.skipped, counters.errors);
                if let Err(err) = self.process_batch(batch, counters).await {
                    if matches!(err, PipelineError::RateLimited) {
                        warn!(term, category = %category, "rate limited mid-batch; cooling down");
                        (counters.indexed, counters.skipped, counters.errors) = snapshot;
                        tokio::time::sleep(Duration::from_secs(self.indexing.cooldown_secs)).await;
                        if let Err(err) = self.process_batch(batch, counters).await {
                            counters.errors += 1;
                            warn!(%err, "batch failed after cooldown");
                        }
                    } else {
                        counters.errors += 1;
                        warn!(%err, "batch failed");
                    }
                }
                self.publish(counters, None);
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if !self.stopped() {
            // Watermark moves to pass start, not pass end: items updated
            // while the pass ran fall into the next overlap window.
            let newly_indexed = (counters.indexed - indexed_before) as i64;
            self.watermarks
                .upsert(term, category, pass_start, newly_indexed)
                .await?;
        }
        Ok(incremental)
    }

    /// Index one batch of listing items: skip already-indexed, fetch
    /// text, segment, embed, upsert.
    async fn process_batch(
        &self,
        batch: &[SourceDocument],
        counters: &mut Counters,
    ) -> Result<(), PipelineError> {
        // A document counts as indexed when its first chunk's key
        // exists.
        let probe_keys: Vec<u64> = batch
            .iter()
            .map(|doc| point_key(doc.category.namespace(), &doc.id, 0, 0))
            .collect();
        let existing = self
            .retry
            .run("existing_ids", || self.store.existing_ids(&probe_keys))
            .await?;

        let mut pending: Vec<(&SourceDocument, Vec<Chunk>)> = Vec::new();
        for (doc, key) in batch.iter().zip(&probe_keys) {
            if existing.contains(key) {
                counters.skipped += 1;
                continue;
            }
            let text = match &doc.text {
                Some(text) => Some(text.clone()),
                None => match self.source.full_text(doc.category, &doc.id).await {
                    Ok(text) => text,
                    Err(PipelineError::RateLimited) => return Err(PipelineError::RateLimited),
                    Err(err) => {
                        counters.errors += 1;
                        warn!(doc_id = %doc.id, %err, "full text fetch failed");
                        continue;
                    }
                },
            };
            let Some(text) = text else {
                // No text document exists for this item; nothing to do.
                counters.skipped += 1;
                continue;
            };

            let outcome = self.segmenter.segment(doc, &text);
            if outcome.chunks.is_empty() {
                counters.skipped += 1;
                continue;
            }
            info!(doc_id = %doc.id, chunks = outcome.chunks.len(), counts = ?outcome.counts, "segmented");
            pending.push((doc, outcome.chunks));
        }

        if pending.is_empty() {
            return Ok(());
        }

        // Embed across document boundaries in provider-sized groups,
        // then reassemble points in order.
        let texts: Vec<String> = pending
            .iter()
            .flat_map(|(_, chunks)| chunks.iter().map(|c| c.text.clone()))
            .collect();
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for group in texts.chunks(self.embed_batch_size) {
            let batch_vectors = self
                .retry
                .run("embed", || self.embedder.embed(group))
                .await?;
            vectors.extend(batch_vectors);
        }

        let mut points = Vec::with_capacity(vectors.len());
        let mut vector_iter = vectors.into_iter();
        for (doc, chunks) in &pending {
            for chunk in chunks {
                let vector = vector_iter
                    .next()
                    .ok_or_else(|| PipelineError::Permanent("embedding underrun".to_string()))?;
                points.push(Point {
                    id: point_key(doc.category.namespace(), &doc.id, chunk.index, chunk.part),
                    vector,
                    payload: point_payload(doc, chunk),
                });
            }
        }

        for group in points.chunks(self.upsert_batch_size) {
            self.retry.run("upsert", || self.store.upsert(group)).await?;
        }

        counters.indexed += pending.len() as u64;
        Ok(())
    }
}

/// Denormalized payload: chunk attributes plus parent document
/// metadata, so searches never need a second lookup.
fn point_payload(doc: &SourceDocument, chunk: &Chunk) -> serde_json::Value {
    let mut payload = json!({
        "namespace": doc.category.namespace(),
        "doc_id": doc.id,
        "chunk_index": chunk.index,
        "part": chunk.part,
        "chunk_type": chunk.kind.label(),
        "category": doc.category.label(),
        "term": doc.metadata.term,
        "text": chunk.text,
        "text_length": chunk.char_len(),
    });
    let object = payload.as_object_mut().expect("payload is an object");
    if let Some(date) = doc.metadata.date {
        object.insert("date".to_string(), json!(date.format("%Y-%m-%d").to_string()));
    }
    if let Some(number) = &doc.metadata.number {
        object.insert("document_number".to_string(), json!(number));
    }
    if let Some(title) = &doc.metadata.title {
        object.insert("title".to_string(), json!(title));
    }
    if let Some(issuer) = &doc.metadata.issuer {
        object.insert("issuer".to_string(), json!(issuer));
    }
    if let Some(speaker) = &chunk.attrs.speaker {
        object.insert("speaker".to_string(), json!(speaker));
    }
    if let Some(affiliation) = &chunk.attrs.affiliation {
        object.insert("affiliation".to_string(), json!(affiliation));
    }
    if let Some(section) = &chunk.attrs.section {
        object.insert("section".to_string(), json!(section));
    }
    if let Some(number) = chunk.attrs.number {
        object.insert("number".to_string(), json!(number));
    }
    payload
}
