//! Splitting source text into overlapping, content-addressed chunks for the
//! vector store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ChunkId, RunId, Source, SourceId};

/// Metadata key carrying the run a chunk was indexed for.
pub const RUN_ID_KEY: &str = "run_id";

/// Chunk size and overlap, in bytes of UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    /// How far back from the hard cut a sentence boundary is searched for.
    pub boundary_window: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            overlap: 200,
            boundary_window: 200,
        }
    }
}

/// One indexed span of a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub source_id: SourceId,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub metadata: BTreeMap<String, String>,
}

/// Splits `text` into `(start, end)` spans.
///
/// Each span is at most `chunk_size` bytes; when the cut falls inside the text
/// it moves back to the last sentence end (`.`, `!` or `?` plus whitespace)
/// within `boundary_window`. Consecutive spans overlap by `overlap` bytes.
/// Offsets always fall on character boundaries.
pub fn chunk_spans(text: &str, config: &ChunkingConfig) -> Vec<(usize, usize)> {
    let len = text.len();
    if len == 0 {
        return Vec::new();
    }
    if len <= config.chunk_size {
        return vec![(0, len)];
    }

    let mut spans = Vec::new();
    let mut start = 0;
    while start < len {
        let mut end = floor_boundary(text, (start + config.chunk_size).min(len));
        if end < len {
            let window_start = ceil_boundary(text, end.saturating_sub(config.boundary_window).max(start));
            if let Some(cut) = last_sentence_end(&text[window_start..end]) {
                end = window_start + cut;
            }
        }
        if end <= start {
            end = ceil_boundary(text, start + 1);
        }
        spans.push((start, end));
        if end >= len {
            break;
        }
        let next = floor_boundary(text, end.saturating_sub(config.overlap));
        start = if next > start { next } else { end };
    }
    spans
}

/// Byte offset just past the whitespace following the last sentence end.
fn last_sentence_end(window: &str) -> Option<usize> {
    let bytes = window.as_bytes();
    let mut found = None;
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j > i + 1 {
                found = Some(j);
            }
            i = j;
        } else {
            i += 1;
        }
    }
    found
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Chunks a source's raw content, tagging every chunk with the run id and the
/// source's provenance. Blank spans are skipped.
pub fn chunk_source(source: &Source, run_id: RunId, config: &ChunkingConfig) -> Vec<Chunk> {
    chunk_spans(&source.raw_content, config)
        .into_iter()
        .filter_map(|(start, end)| {
            let text = source.raw_content[start..end].trim();
            (!text.is_empty()).then_some((start, end, text))
        })
        .enumerate()
        .map(|(index, (start, end, text))| {
            let metadata = BTreeMap::from([
                (RUN_ID_KEY.to_string(), run_id.to_string()),
                ("source_id".to_string(), source.source_id.to_string()),
                ("url".to_string(), source.url.clone()),
                ("title".to_string(), source.title.clone()),
                ("domain".to_string(), source.domain.clone()),
                ("chunk_index".to_string(), index.to_string()),
            ]);
            Chunk {
                chunk_id: ChunkId::for_span(&source.source_id, start, end),
                source_id: source.source_id.clone(),
                text: text.to_string(),
                start,
                end,
                metadata,
            }
        })
        .collect()
}
