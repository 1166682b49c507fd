//! Core data models used throughout Plenum.
//!
//! These types represent the documents, chunks, and points that flow
//! through the indexing pipeline, plus the watermark and pass-report
//! records that track indexing progress.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Document category as partitioned by the upstream DIP-style API.
///
/// Together with the electoral term this bounds the scope of a crawl
/// and selects the segmentation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocCategory {
    /// Plenary debate transcript (Plenarprotokoll).
    Transcript,
    /// Draft bill (Gesetzentwurf).
    Bill,
    /// Parliamentary inquiry (Kleine/Große Anfrage).
    Inquiry,
    /// Motion (Antrag).
    Motion,
    /// Committee report or recommendation (Bericht, Beschlussempfehlung).
    Report,
    /// Legislative proceeding record (Vorgang).
    Proceeding,
    /// Person record.
    Person,
    /// Activity record (Aktivität).
    Activity,
}

impl DocCategory {
    /// Identity namespace for point keys. Must stay stable: changing a
    /// namespace changes every key in that category and orphans the
    /// already-indexed points.
    pub fn namespace(self) -> &'static str {
        match self {
            DocCategory::Transcript => "protocol",
            DocCategory::Bill
            | DocCategory::Inquiry
            | DocCategory::Motion
            | DocCategory::Report => "drucksache",
            DocCategory::Proceeding => "vorgang",
            DocCategory::Person => "person",
            DocCategory::Activity => "activity",
        }
    }

    /// Filter value used in upstream listing requests.
    pub fn api_filter(self) -> &'static str {
        match self {
            DocCategory::Transcript => "plenarprotokoll",
            DocCategory::Bill => "gesetzentwurf",
            DocCategory::Inquiry => "anfrage",
            DocCategory::Motion => "antrag",
            DocCategory::Report => "bericht",
            DocCategory::Proceeding => "vorgang",
            DocCategory::Person => "person",
            DocCategory::Activity => "aktivitaet",
        }
    }

    /// Stable label used in watermark rows and point payloads.
    pub fn label(self) -> &'static str {
        match self {
            DocCategory::Transcript => "transcript",
            DocCategory::Bill => "bill",
            DocCategory::Inquiry => "inquiry",
            DocCategory::Motion => "motion",
            DocCategory::Report => "report",
            DocCategory::Proceeding => "proceeding",
            DocCategory::Person => "person",
            DocCategory::Activity => "activity",
        }
    }

    pub fn parse_label(s: &str) -> Option<Self> {
        match s {
            "transcript" => Some(DocCategory::Transcript),
            "bill" => Some(DocCategory::Bill),
            "inquiry" => Some(DocCategory::Inquiry),
            "motion" => Some(DocCategory::Motion),
            "report" => Some(DocCategory::Report),
            "proceeding" => Some(DocCategory::Proceeding),
            "person" => Some(DocCategory::Person),
            "activity" => Some(DocCategory::Activity),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Metadata carried by every listing item and denormalized into point payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocMetadata {
    /// Electoral term (Wahlperiode), e.g. 20.
    pub term: u32,
    /// Content date of the document, when the upstream reports one.
    pub date: Option<NaiveDate>,
    /// Document number, e.g. "20/1234".
    pub number: Option<String>,
    pub title: Option<String>,
    /// Issuing body (Herausgeber), e.g. "BT".
    pub issuer: Option<String>,
}

/// Raw item produced by the source listing before segmentation.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Upstream id, unique within the source.
    pub id: String,
    pub category: DocCategory,
    pub metadata: DocMetadata,
    /// Full text when the listing response inlines it; otherwise fetched
    /// separately via the full-text endpoint.
    pub text: Option<String>,
}

/// Semantic type of a chunk, recorded in the point payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkKind {
    Speech,
    AgendaItem,
    Section,
    Article,
    Rationale,
    Preamble,
    Question,
    ResolutionPoint,
    Paragraph,
}

impl ChunkKind {
    pub fn label(self) -> &'static str {
        match self {
            ChunkKind::Speech => "speech",
            ChunkKind::AgendaItem => "agenda_item",
            ChunkKind::Section => "section",
            ChunkKind::Article => "article",
            ChunkKind::Rationale => "rationale",
            ChunkKind::Preamble => "preamble",
            ChunkKind::Question => "question",
            ChunkKind::ResolutionPoint => "resolution_point",
            ChunkKind::Paragraph => "paragraph",
        }
    }
}

/// Free-form attributes attached to a chunk by the segmenter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkAttrs {
    /// Speaker name for transcript speeches.
    pub speaker: Option<String>,
    /// Speaker role or party affiliation.
    pub affiliation: Option<String>,
    /// Section or agenda-item title.
    pub section: Option<String>,
    /// Article / question / point number within the document.
    pub number: Option<u32>,
}

/// A contiguous, semantically bounded span of source text.
///
/// Chunks are ephemeral: they are recomputed on every pass and exist only
/// long enough to be embedded and turned into [`Point`]s. `(doc_id, index,
/// part)` feeds the deterministic identity scheme, so the segmenter must
/// assign both deterministically.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub doc_id: String,
    /// Sequence index within the document, contiguous from 0.
    pub index: u32,
    /// Part number for oversize re-splits; 0 for unsplit chunks.
    pub part: u32,
    pub kind: ChunkKind,
    pub attrs: ChunkAttrs,
    pub text: String,
}

impl Chunk {
    /// Cleaned text length in characters (the unit all thresholds use).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A (key, vector, payload) triple ready for upsert into the vector store.
#[derive(Debug, Clone)]
pub struct Point {
    /// Deterministic key from [`crate::identity::point_key`].
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: serde_json::Value,
}

/// Persisted indexing progress for one (term, category) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    pub term: u32,
    pub category: DocCategory,
    /// Start time of the last pass that completed without a pass-aborting
    /// error for this pair.
    pub last_indexed_at: DateTime<Utc>,
    /// Cumulative number of documents indexed across all passes.
    pub indexed_count: i64,
}

/// Mode of an indexing pass, derived from watermark presence.
///
/// Each (term, category) pair runs full or incremental on its own;
/// `Mixed` reports a pass whose pairs disagreed, e.g. after a new
/// category was added to the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    Full,
    Incremental,
    Mixed,
}

/// Running/last-run statistics exposed through the status interface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    pub running: bool,
    pub mode: Option<PassMode>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub indexed: u64,
    pub skipped: u64,
    pub errors: u64,
}
