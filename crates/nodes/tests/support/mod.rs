//! In-process fakes for the infrastructure ports.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nodes::{LlmGateway, PipelineConfig, RateLimiter, RunContext, Services};
use pipeline::{
    Chunk, Completion, CompletionRequest, LlmError, LlmProvider, MetadataFilter, RetrievedChunk, RunId,
    ScrapeError, ScrapedPage, Scraper, SearchBackend, SearchError, SearchHit, StoreError, TokenCount, Usage,
    VectorStore,
};

/// Answers each request according to the role named in its system prompt.
pub struct RoleProvider {
    pub article_body: String,
}

impl RoleProvider {
    fn answer(&self, system: &str) -> Result<String, LlmError> {
        let json = |value: serde_json::Value| Ok(value.to_string());
        if system.contains("Topic Planner") {
            json(serde_json::json!({
                "title": "Rust Memory Safety",
                "sections": [{
                    "title": "Ownership",
                    "key_questions": ["How does ownership prevent data races?"],
                    "expected_claims": ["Rust prevents data races at compile time"],
                    "estimated_words": 300
                }],
                "target_keywords": ["rust", "memory safety"],
                "estimated_total_words": 300,
                "rationale": "One focused section."
            }))
        } else if system.contains("Section Drafter") {
            Ok("Rust prevents data races at compile time [1].".to_string())
        } else if system.contains("Extract atomic") {
            json(serde_json::json!({
                "claims": [
                    {"text": "Rust prevents data races at compile time", "evidence_candidates": ["1"]},
                    {"text": "The borrow checker enforces ownership rules", "evidence_candidates": ["2"]}
                ]
            }))
        } else if system.contains("Fact-Checker") {
            json(serde_json::json!({
                "verdict": "supported",
                "confidence": 0.9,
                "evidence": [{"quote": "data races at compile time", "relevance": 0.9}],
                "reasoning": "Stated directly by the source."
            }))
        } else if system.contains("Narrative Writer") || system.contains("Style Editor") {
            Ok(self.article_body.clone())
        } else if system.contains("SEO Specialist") {
            let description = "Learn how the Rust ownership model and the borrow checker rule out data races \
                               at compile time, with cited sources and practical guidance for engineering teams.";
            json(serde_json::json!({
                "title": "Rust Memory Safety Explained",
                "slug": "",
                "meta_description": description,
                "keywords": ["rust", "memory safety", "borrow checker", "ownership", "data races"],
                "h1": "Rust Memory Safety",
                "internal_links": [{"anchor": "ownership basics", "topic": "Rust ownership"}]
            }))
        } else {
            Err(LlmError::Permanent {
                status: 400,
                message: "unexpected prompt".to_string(),
            })
        }
    }
}

#[async_trait]
impl LlmProvider for RoleProvider {
    fn name(&self) -> &str {
        "role-fake"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let system = request.messages.first().map(|m| m.content.as_str()).unwrap_or_default();
        Ok(Completion {
            content: self.answer(system)?,
            usage: Usage {
                prompt_tokens: TokenCount::new(100),
                completion_tokens: TokenCount::new(20),
            },
        })
    }
}

/// Fails every request.
pub struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, LlmError> {
        Err(LlmError::Permanent {
            status: 401,
            message: "unauthorized".to_string(),
        })
    }
}

/// Returns the same hits for every query.
pub struct StaticSearch(pub Vec<&'static str>);

#[async_trait]
impl SearchBackend for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self
            .0
            .iter()
            .take(max_results)
            .map(|url| SearchHit {
                url: url.to_string(),
                title: String::new(),
                snippet: String::new(),
                score: 0.8,
            })
            .collect())
    }
}

/// Serves a short page about Rust for every URL.
pub struct RustPages;

#[async_trait]
impl Scraper for RustPages {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ScrapeError> {
        Ok(ScrapedPage {
            final_url: url.to_string(),
            raw_text: format!(
                "Rust prevents data races at compile time. The borrow checker enforces ownership rules. \
                 Memory safety without garbage collection. Served from {url}."
            ),
            title: Some(format!("Rust ownership ({url})")),
            author: Some("Ferris".to_string()),
            published_date: Some("2024-05-01".to_string()),
        })
    }
}

/// [`RustPages`] that counts every fetch.
#[derive(Clone, Default)]
pub struct CountingPages {
    fetched: Arc<AtomicUsize>,
}

impl CountingPages {
    pub fn fetched(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for CountingPages {
    async fn scrape(&self, url: &str) -> Result<ScrapedPage, ScrapeError> {
        self.fetched.fetch_add(1, Ordering::SeqCst);
        RustPages.scrape(url).await
    }
}

/// Keeps chunks in insertion order and returns the first matches.
#[derive(Default)]
pub struct MemoryStore {
    chunks: Mutex<Vec<Chunk>>,
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn add(&self, chunks: Vec<Chunk>) -> Result<usize, StoreError> {
        let count = chunks.len();
        let mut stored = self.chunks.lock().map_err(|e| StoreError::Unavailable { message: e.to_string() })?;
        stored.retain(|c| chunks.iter().all(|n| n.chunk_id != c.chunk_id));
        stored.extend(chunks);
        Ok(count)
    }

    async fn query(&self, _text: &str, k: usize, filter: &MetadataFilter) -> Result<Vec<RetrievedChunk>, StoreError> {
        let stored = self.chunks.lock().map_err(|e| StoreError::Unavailable { message: e.to_string() })?;
        Ok(stored
            .iter()
            .filter(|c| filter.matches(&c.metadata))
            .take(k)
            .map(|c| RetrievedChunk {
                chunk_id: c.chunk_id.clone(),
                source_id: c.source_id.clone(),
                text: c.text.clone(),
                score: 1.0,
                metadata: c.metadata.clone(),
            })
            .collect())
    }
}

/// Defaults with rate limits high enough that no test waits on the limiter.
pub fn config() -> PipelineConfig {
    PipelineConfig {
        max_calls_per_minute: 1_000,
        max_tokens_per_minute: 10_000_000,
        ..PipelineConfig::default()
    }
}

pub fn services(provider: Arc<dyn LlmProvider>, config: &PipelineConfig) -> Services {
    let limiter = Arc::new(RateLimiter::new(config.rate_limits()));
    let routing = config.model_routing().unwrap();
    Services {
        gateway: Arc::new(LlmGateway::new(provider, limiter, routing)),
        search: vec![Arc::new(StaticSearch(vec![
            "https://doc.rust-lang.org/book/ownership",
            "https://en.wikipedia.org/wiki/Rust_(programming_language)",
        ]))],
        scraper: Arc::new(RustPages),
        store: Arc::new(MemoryStore::default()),
    }
}

pub fn context(provider: Arc<dyn LlmProvider>, config: PipelineConfig) -> RunContext {
    let services = services(provider, &config);
    RunContext::new(RunId::new_random(), Arc::new(config), services)
}
