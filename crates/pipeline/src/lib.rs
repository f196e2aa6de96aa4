//! Core domain for Scrivener, the quality-gated article pipeline.
//!
//! This crate contains every domain concept, newtype identifier, shared primitive
//! type, and cross-cutting error type used throughout the pipeline: the data
//! model, the citation mapper and validator, quality metrics, the quality gate,
//! the run blackboard and its reducer, and the port traits implemented by the
//! infrastructure crates.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RunId`, `SourceId`, `ClaimId`, `ChunkId`, `CitationId`) |
//! | [`types`] | Shared value types (`TokenCount`, `Confidence`, `Timestamp`) |
//! | [`errors`] | `PipelineError` and `RetryPolicy` |
//! | [`topic`] | Run input and the planned outline |
//! | [`source`] | Source documents, canonical URLs, ranking |
//! | [`claim`] | Claims and fact-check verdicts |
//! | [`citation`] | Citation mapper, validator, bibliography rendering |
//! | [`quality`] | Quality metrics and readability |
//! | [`gate`] | Gate thresholds, decisions and retry eligibility |
//! | [`article`] | Drafts, article, SEO metadata, run metrics |
//! | [`state`] | Stage graph, `RunState`, `StageDelta` reducer |
//! | [`schema`] | Typed JSON response schemas |
//! | [`chunking`] | Source chunking for retrieval |
//! | [`export`] | Markdown and JSON projections of a run |
//! | [`ports`] | Traits for model inference, search, scraping, retrieval, publishing |

pub mod article;
pub mod chunking;
pub mod citation;
pub mod claim;
pub mod errors;
pub mod export;
pub mod gate;
pub mod identifiers;
pub mod ports;
pub mod quality;
pub mod schema;
pub mod source;
pub mod state;
pub mod topic;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use article::{
    article_json_ld, extract_h2_headings, slugify, Article, DraftSection, InternalLink, RunMetrics,
    SeoMetadata,
};
pub use chunking::{chunk_source, Chunk, ChunkingConfig};
pub use citation::{
    build_citation_map, format_bibliography_markdown, strip_citation_markers, validate_citations,
    Citation, CitationIssue, CitationMap, SentenceCitationMapping, COMMON_KNOWLEDGE_MARKER,
};
pub use claim::{Claim, EvidencePointer, Verdict, VerdictOutcome};
pub use errors::{PipelineError, RetryPolicy};
pub use export::{export_json, export_markdown, ExportError};
pub use gate::{evaluate_gate, should_retry, GateDecision, GateThresholds};
pub use identifiers::{ChunkId, CitationId, ClaimId, ModelName, RunId, SourceId};
pub use ports::{
    ChatMessage, Completion, CompletionRequest, LlmError, LlmProvider, MetadataFilter,
    PublishError, PublishReceipt, PublishStatus, Publisher, ResponseFormat, RetrievedChunk, Role,
    ScrapeError, Scraper, SearchBackend, SearchError, StoreError, Usage, VectorStore,
};
pub use quality::{compute_quality_metrics, QualityMetrics};
pub use schema::{ResponseSchema, SchemaError};
pub use source::{ScrapedPage, SearchHit, Source};
pub use state::{LogEntry, RunState, RunStatus, SourcePack, Stage, StageDelta};
pub use topic::{Outline, OutlineSection, TopicSpec};
pub use types::{Confidence, TokenCount, Timestamp};
