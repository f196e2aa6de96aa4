//! Quality metrics derived from a citation map and fact-check verdicts.
//!
//! Metrics are recomputed at every gate evaluation and never cached across
//! passes; see [`compute_quality_metrics`].

use serde::{Deserialize, Serialize};

use crate::citation::{strip_citation_markers, split_sentences};
use crate::{CitationMap, Verdict};

/// Reading ease reported when the score cannot be computed (e.g. no words).
pub const NEUTRAL_READING_LEVEL: f64 = 60.0;

/// Scalar health indicators for one article at one gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Fraction of sentences that are cited or common knowledge.
    pub citation_coverage: f64,
    /// Fraction of verdicts that are refuted or need more evidence.
    pub unsupported_claim_rate: f64,
    /// Mean verdict confidence.
    pub avg_fact_confidence: f64,
    /// Flesch reading ease of the marker-free article text.
    pub reading_level: f64,
    /// Number of verdicts.
    pub total_claims: usize,
    /// Number of sources held by the run.
    pub total_sources: usize,
    /// Number of bibliography entries.
    pub total_citations: usize,
}

/// Derives [`QualityMetrics`] for an article.
///
/// Rates over an empty verdict list are 0.0. The reading level falls back to
/// [`NEUTRAL_READING_LEVEL`] when it cannot be computed.
pub fn compute_quality_metrics(
    citation_map: &CitationMap,
    verdicts: &[Verdict],
    article_text: &str,
    total_sources: usize,
) -> QualityMetrics {
    let total_claims = verdicts.len();
    let (unsupported_claim_rate, avg_fact_confidence) = if total_claims == 0 {
        (0.0, 0.0)
    } else {
        let unsupported = verdicts.iter().filter(|v| v.outcome.is_unsupported()).count();
        let confidence_sum: f64 = verdicts.iter().map(|v| v.confidence.as_f64()).sum();
        (
            unsupported as f64 / total_claims as f64,
            confidence_sum / total_claims as f64,
        )
    };

    let reading_level = flesch_reading_ease(&strip_citation_markers(article_text)).unwrap_or_else(|| {
        tracing::warn!("reading level could not be computed; using neutral default");
        NEUTRAL_READING_LEVEL
    });

    let metrics = QualityMetrics {
        citation_coverage: citation_map.coverage_rate,
        unsupported_claim_rate,
        avg_fact_confidence,
        reading_level,
        total_claims,
        total_sources,
        total_citations: citation_map.bibliography.len(),
    };
    tracing::info!(
        citation_coverage = metrics.citation_coverage,
        unsupported_claim_rate = metrics.unsupported_claim_rate,
        avg_fact_confidence = metrics.avg_fact_confidence,
        reading_level = metrics.reading_level,
        "quality metrics computed"
    );
    metrics
}

/// Counts whitespace-separated words that contain at least one alphanumeric
/// character.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

/// Flesch reading ease:
/// `206.835 - 1.015 * (words / sentences) - 84.6 * (syllables / words)`.
///
/// Markdown heading and emphasis characters are ignored. Returns `None` for
/// text without words.
pub fn flesch_reading_ease(text: &str) -> Option<f64> {
    let plain = text.replace(['#', '*', '_', '`', '>'], " ");
    let words = plain
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();
    if words.is_empty() {
        return None;
    }
    let sentences = split_sentences(&plain).len().max(1);
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let words_per_sentence = words.len() as f64 / sentences as f64;
    let syllables_per_word = syllables as f64 / words.len() as f64;
    let score = 206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word;
    score.is_finite().then_some(score)
}

/// Vowel-group syllable estimate with a silent trailing `e`; at least one per
/// word. Digits count as a single syllable.
fn count_syllables(word: &str) -> usize {
    let lower = word.to_lowercase();
    if !lower.chars().any(char::is_alphabetic) {
        return 1;
    }
    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut previous_vowel = false;
    for c in lower.chars() {
        let vowel = is_vowel(c);
        if vowel && !previous_vowel {
            count += 1;
        }
        previous_vowel = vowel;
    }
    if lower.ends_with('e') && !lower.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}
