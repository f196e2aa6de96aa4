//! Port traits for the external collaborators of the pipeline.
//!
//! The domain defines *what* it needs from model inference, web search, page
//! scraping, vector retrieval and publishing; the infrastructure crates
//! (`llm`, `research`, `publish`) define *how*. Every port error that can be
//! transient exposes a [`RetryPolicy`].
//!
//! | Port | Implemented in |
//! |------|----------------|
//! | [`LlmProvider`] | `llm` |
//! | [`SearchBackend`], [`Scraper`], [`VectorStore`] | `research` |
//! | [`Publisher`] | `publish` |

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunking::RUN_ID_KEY;
use crate::{Chunk, ChunkId, ExportError, ModelName, RetryPolicy, RunId, RunState, ScrapedPage, SearchHit, SourceId, TokenCount};

// ---------------------------------------------------------------------------
// Model inference
// ---------------------------------------------------------------------------

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Requested output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// The provider must return a single JSON object.
    JsonObject,
}

/// A chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: ModelName,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

impl CompletionRequest {
    /// Rough token cost used for rate limiting: message characters / 4 plus
    /// the completion budget.
    pub fn estimated_tokens(&self) -> TokenCount {
        let chars: usize = self.messages.iter().map(|m| m.content.chars().count()).sum();
        TokenCount::new((chars / 4) as u64 + u64::from(self.max_tokens))
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: TokenCount,
    pub completion_tokens: TokenCount,
}

impl Usage {
    pub fn total(&self) -> TokenCount {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A chat-completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
}

/// Model-inference failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LlmError {
    /// The provider throttled the request.
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// Timeout, connection failure, 408 or 5xx.
    #[error("transient provider error: {message}")]
    Transient { message: String },

    /// Authentication failure or another client error.
    #[error("provider rejected the request ({status}): {message}")]
    Permanent { status: u16, message: String },

    /// The provider answered without any content.
    #[error("provider returned an empty response")]
    EmptyResponse,

    /// The provider response body could not be decoded.
    #[error("could not decode provider response: {message}")]
    Decode { message: String },
}

impl LlmError {
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RateLimited { retry_after } => RetryPolicy::Retryable { after: *retry_after },
            Self::Transient { .. } => RetryPolicy::Retryable { after: None },
            Self::Permanent { .. } | Self::EmptyResponse | Self::Decode { .. } => RetryPolicy::NonRetryable,
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier used in logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

// ---------------------------------------------------------------------------
// Search and scraping
// ---------------------------------------------------------------------------

/// Search backend failures. Always non-fatal to the run: the harvester falls
/// back to the next backend.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    /// The backend is not configured (e.g. no API key).
    #[error("search backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("search request failed with status {status}")]
    Http { status: u16 },

    #[error("search transport error: {message}")]
    Transport { message: String },

    #[error("could not decode search response: {message}")]
    Decode { message: String },
}

/// A web search backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Ranked hits for `query`, at most `max_results`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Page fetch failures. A failed scrape drops that page only.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScrapeError {
    #[error("page request failed with status {status}")]
    Http { status: u16 },

    #[error("unsupported content type '{content_type}'")]
    UnsupportedContent { content_type: String },

    #[error("page transport error: {message}")]
    Transport { message: String },

    #[error("page has no extractable text")]
    Empty,
}

impl ScrapeError {
    /// 408, 429, 5xx and transport failures are retryable; everything else,
    /// notably 403/404/410, is not.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Http { status } if *status == 408 || *status == 429 || *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Transport { .. } => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Fetches a URL and extracts its main text.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ScrapeError>;
}

// ---------------------------------------------------------------------------
// Vector store
// ---------------------------------------------------------------------------

/// Exact-match metadata constraints applied to a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter(BTreeMap<String, String>);

impl MetadataFilter {
    /// Restricts results to chunks indexed for `run_id`.
    pub fn for_run(run_id: RunId) -> Self {
        Self::default().with(RUN_ID_KEY, run_id.to_string())
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// `true` when every constraint is present in `metadata` with an equal value.
    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| metadata.get(k) == Some(v))
    }
}

/// One query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: ChunkId,
    pub source_id: SourceId,
    pub text: String,
    /// Similarity to the query; higher is closer.
    pub score: f64,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("vector store unavailable: {message}")]
    Unavailable { message: String },

    #[error("vector store rejected the operation: {message}")]
    Rejected { message: String },
}

/// Similarity search over indexed chunks.
///
/// Adding a chunk whose id is already stored replaces it.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Stores `chunks`, returning how many were written.
    async fn add(&self, chunks: Vec<Chunk>) -> Result<usize, StoreError>;

    /// The `k` chunks most similar to `text` that satisfy `filter`, best first.
    async fn query(&self, text: &str, k: usize, filter: &MetadataFilter) -> Result<Vec<RetrievedChunk>, StoreError>;
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

/// What a publisher did with the article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// Written to local files.
    Saved,
    /// Created as an unpublished draft in a CMS.
    Draft,
}

/// Where the article ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    pub status: PublishStatus,
    /// A file path, URL or CMS identifier.
    pub location: String,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("could not write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("CMS request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("CMS transport error: {message}")]
    Transport { message: String },
}

/// Delivers a finished run somewhere.
///
/// Repeated calls may create duplicates; idempotency is the caller's concern.
#[async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, state: &RunState) -> Result<PublishReceipt, PublishError>;
}
