//! Source documents: canonicalisation, content addressing, de-duplication and
//! ranking.
//!
//! A [`Source`] is immutable once fetched, apart from its two scores, which
//! are set exactly once by [`rank_sources`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::identifiers::sha256_hex;
use crate::{Outline, SourceId, Timestamp};

/// Domains whose content is treated as highly authoritative.
const HIGH_AUTHORITY: &[&str] = &[".edu", ".gov", ".ac.", "nature.com", "science.org", "ieee.org"];

/// Domains whose content is treated as moderately authoritative.
const MEDIUM_AUTHORITY: &[&str] = &[".org", "medium.com", "wikipedia.org"];

const RELEVANCE_WEIGHT: f64 = 0.6;
const AUTHORITY_WEIGHT: f64 = 0.4;

// ---------------------------------------------------------------------------
// Boundary types
// ---------------------------------------------------------------------------

/// One ranked hit returned by a search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result URL as returned by the backend.
    pub url: String,
    /// Result title.
    pub title: String,
    /// Short excerpt shown by the backend.
    pub snippet: String,
    /// Backend-assigned relevance score (backend-specific scale).
    pub score: f64,
}

/// The extracted content of one fetched page, as returned by a scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// The URL after redirects.
    pub final_url: String,
    /// Extracted main text.
    pub raw_text: String,
    /// Page title, if one could be extracted.
    pub title: Option<String>,
    /// Author, if one could be extracted.
    pub author: Option<String>,
    /// Publication date as found in the page (format not normalised).
    pub published_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// A fetched, content-addressed source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Hash of the canonical URL.
    pub source_id: SourceId,
    /// Canonical URL.
    pub url: String,
    /// Host part of the canonical URL.
    pub domain: String,
    /// Page title (`"Untitled"` when none could be extracted).
    pub title: String,
    /// Author, when known.
    pub author: Option<String>,
    /// Publication date, when known.
    pub published_date: Option<String>,
    /// When the page was fetched.
    pub fetched_at: Timestamp,
    /// Extracted main text.
    pub raw_content: String,
    /// SHA-256 of `raw_content`.
    pub content_hash: String,
    /// Keyword relevance to the outline, `[0.0, 1.0]`.
    pub relevance_score: f64,
    /// Domain authority heuristic, `[0.0, 1.0]`.
    pub authority_score: f64,
}

impl Source {
    /// Builds a source from a scraped page.
    ///
    /// Returns `None` when the final URL cannot be parsed or has no host; such
    /// pages are dropped rather than failing the stage.
    pub fn from_page(page: ScrapedPage, fetched_at: Timestamp) -> Option<Self> {
        let url = canonical_url(&page.final_url)?;
        let domain = Url::parse(&url).ok()?.host_str()?.to_string();
        let title = page
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string());
        Some(Self {
            source_id: SourceId::from_canonical_url(&url),
            content_hash: sha256_hex(&page.raw_text),
            url,
            domain,
            title,
            author: page.author,
            published_date: page.published_date,
            fetched_at,
            raw_content: page.raw_text,
            relevance_score: 0.0,
            authority_score: 0.0,
        })
    }

    /// Weighted ranking score (60% relevance, 40% authority).
    pub fn combined_score(&self) -> f64 {
        RELEVANCE_WEIGHT * self.relevance_score + AUTHORITY_WEIGHT * self.authority_score
    }
}

/// Normalises a URL to `scheme://host[:port]/path` with no query, fragment or
/// trailing slash.
///
/// Returns `None` when `raw` is not an absolute URL with a host.
pub fn canonical_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?;
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let mut canonical = format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path());
    while canonical.ends_with('/') {
        canonical.pop();
    }
    Some(canonical)
}

// ---------------------------------------------------------------------------
// Scoring and selection
// ---------------------------------------------------------------------------

/// Heuristic domain authority: 1.0 for academic/government/flagship science
/// publishers, 0.7 for organisations and reference sites, otherwise 0.5.
pub fn authority_score(domain: &str) -> f64 {
    let domain = domain.to_lowercase();
    if HIGH_AUTHORITY.iter().any(|m| domain.contains(m)) {
        1.0
    } else if MEDIUM_AUTHORITY.iter().any(|m| domain.contains(m)) {
        0.7
    } else {
        0.5
    }
}

/// Fraction of the outline's relevance keywords found in the source title or
/// content. Returns 0.5 when the outline has no keywords.
pub fn relevance_score(source: &Source, outline: &Outline) -> f64 {
    let keywords = outline.relevance_keywords();
    if keywords.is_empty() {
        return 0.5;
    }
    let content = source.raw_content.to_lowercase();
    let title = source.title.to_lowercase();
    let matches = keywords
        .iter()
        .filter(|k| content.contains(k.as_str()) || title.contains(k.as_str()))
        .count();
    (matches as f64 / keywords.len() as f64).min(1.0)
}

/// Scores every source against the outline and sorts by descending combined
/// score. The sort is stable, so equally scored sources keep fetch order.
pub fn rank_sources(mut sources: Vec<Source>, outline: &Outline) -> Vec<Source> {
    for source in &mut sources {
        source.authority_score = authority_score(&source.domain);
        source.relevance_score = relevance_score(source, outline);
    }
    sources.sort_by(|a, b| b.combined_score().total_cmp(&a.combined_score()));
    sources
}

/// Drops sources whose content hash or source id was already seen, keeping
/// the first occurrence.
pub fn deduplicate_sources(sources: Vec<Source>) -> Vec<Source> {
    let mut hashes = HashSet::new();
    let mut ids = HashSet::new();
    sources
        .into_iter()
        .filter(|s| {
            let fresh = !hashes.contains(&s.content_hash) && !ids.contains(&s.source_id);
            if fresh {
                hashes.insert(s.content_hash.clone());
                ids.insert(s.source_id.clone());
            }
            fresh
        })
        .collect()
}

/// Fraction of distinct domains among `sources`; 0.0 for an empty list.
pub fn domain_diversity(sources: &[Source]) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = sources.iter().map(|s| s.domain.as_str()).collect();
    unique.len() as f64 / sources.len() as f64
}
