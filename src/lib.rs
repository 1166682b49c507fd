//! # Plenum
//!
//! An incremental semantic indexing pipeline for parliamentary
//! documents and plenary transcripts.
//!
//! Plenum crawls a DIP-style document API one (electoral term,
//! document category) pair at a time, segments each document into
//! semantically bounded chunks (speeches, articles, questions,
//! resolution points), embeds the chunks, and upserts them into a
//! Qdrant collection under deterministic point keys. Watermarks in an
//! embedded SQLite database make re-runs incremental, and the
//! existence check against the vector store makes them idempotent.
//!
//! ## Pipeline stages
//!
//! | Stage | Module |
//! |-------|--------|
//! | Listing crawl and full-text fetch | [`source`] |
//! | Segmentation (transcript FSM, document parsers, fallback) | [`segment`] |
//! | Deterministic chunk identity | [`identity`] |
//! | Embedding | [`embedding`] |
//! | Vector upsert and existence checks | [`vector`] |
//! | Watermarks and bootstrap | [`watermark`] |
//! | Pass orchestration | [`indexer`] |
//!
//! Outbound calls to the document API are wrapped in a token-bucket
//! rate limiter, a circuit breaker, and retry with exponential backoff
//! ([`resilience`]).

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod identity;
pub mod indexer;
pub mod migrate;
pub mod models;
pub mod resilience;
pub mod segment;
pub mod server;
pub mod source;
pub mod vector;
pub mod watermark;
