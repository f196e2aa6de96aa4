//! In-process vector store over term-frequency vectors.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use pipeline::chunking::RUN_ID_KEY;
use pipeline::{Chunk, ChunkId, MetadataFilter, RetrievedChunk, StoreError, VectorStore};
use tokio::sync::RwLock;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it", "its", "of", "on",
    "or", "that", "the", "this", "to", "was", "were", "with",
];

struct Entry {
    chunk: Chunk,
    terms: HashMap<String, f64>,
    norm: f64,
}

/// Lexical stand-in for an embedding store: chunks are ranked by cosine
/// similarity of their term-frequency vectors to the query.
///
/// Entries are keyed by run id and chunk id: re-adding a chunk within a run
/// replaces it, while two runs indexing the same source keep separate
/// copies. Ties are broken by key so results are deterministic.
#[derive(Default)]
pub struct MemoryVectorStore {
    entries: RwLock<BTreeMap<(String, ChunkId), Entry>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut terms = HashMap::new();
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(&t.as_str()))
    {
        *terms.entry(term).or_insert(0.0) += 1.0;
    }
    terms
}

fn norm(terms: &HashMap<String, f64>) -> f64 {
    terms.values().map(|v| v * v).sum::<f64>().sqrt()
}

fn cosine(query: &HashMap<String, f64>, query_norm: f64, entry: &Entry) -> f64 {
    if query_norm == 0.0 || entry.norm == 0.0 {
        return 0.0;
    }
    let dot: f64 = query
        .iter()
        .filter_map(|(term, weight)| entry.terms.get(term).map(|w| w * weight))
        .sum();
    dot / (query_norm * entry.norm)
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, chunks: Vec<Chunk>) -> Result<usize, StoreError> {
        let count = chunks.len();
        let mut entries = self.entries.write().await;
        for chunk in chunks {
            let terms = term_frequencies(&chunk.text);
            let norm = norm(&terms);
            let key = (
                chunk.metadata.get(RUN_ID_KEY).cloned().unwrap_or_default(),
                chunk.chunk_id.clone(),
            );
            entries.insert(key, Entry { chunk, terms, norm });
        }
        tracing::debug!(added = count, total = entries.len(), "chunks stored");
        Ok(count)
    }

    async fn query(&self, text: &str, k: usize, filter: &MetadataFilter) -> Result<Vec<RetrievedChunk>, StoreError> {
        let query = term_frequencies(text);
        let query_norm = norm(&query);
        let entries = self.entries.read().await;

        let mut scored = entries
            .values()
            .filter(|e| filter.matches(&e.chunk.metadata))
            .map(|e| (cosine(&query, query_norm, e), e))
            .collect::<Vec<_>>();
        // Stable sort keeps key order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, e)| RetrievedChunk {
                chunk_id: e.chunk.chunk_id.clone(),
                source_id: e.chunk.source_id.clone(),
                text: e.chunk.text.clone(),
                score,
                metadata: e.chunk.metadata.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{chunk_source, ChunkingConfig, RunId, ScrapedPage, Source, Timestamp};

    fn source(url: &str, text: &str) -> Source {
        Source::from_page(
            ScrapedPage {
                final_url: url.into(),
                raw_text: text.into(),
                title: Some("t".into()),
                author: None,
                published_date: None,
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn ranks_by_similarity_within_the_run() {
        let store = MemoryVectorStore::new();
        let run = RunId::new_random();
        let other_run = RunId::new_random();
        let config = ChunkingConfig::default();

        let borrow = source("https://a.org/borrow", "The borrow checker enforces ownership rules.");
        let gc = source("https://b.org/gc", "Garbage collection pauses the program.");
        let mut chunks = chunk_source(&borrow, run, &config);
        chunks.extend(chunk_source(&gc, run, &config));
        chunks.extend(chunk_source(&borrow, other_run, &config));
        assert_eq!(store.add(chunks).await.unwrap(), 3);

        let hits = store
            .query("how does the borrow checker work", 5, &MetadataFilter::for_run(run))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].source_id, borrow.source_id);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[1].score, 0.0);
    }

    #[tokio::test]
    async fn re_adding_a_chunk_replaces_it() {
        let store = MemoryVectorStore::new();
        let run = RunId::new_random();
        let chunks = chunk_source(&source("https://a.org/x", "Rust ownership."), run, &ChunkingConfig::default());
        store.add(chunks.clone()).await.unwrap();
        store.add(chunks).await.unwrap();
        assert_eq!(store.len().await, 1);
    }
}
