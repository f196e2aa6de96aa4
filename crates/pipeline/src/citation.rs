//! Citation integrity: sentence-level citation mapping and referential
//! validation.
//!
//! The mapper ([`build_citation_map`]) and the validator
//! ([`validate_citations`]) are pure functions. The mapper never renumbers:
//! citation id `n` is the `n`-th entry of the source list it is given, and the
//! inline `[n]` markers already present in the text are expected to follow the
//! same numbering. Whether they do is checked only by the validator.
//!
//! ## Offsets
//!
//! Sentence offsets are byte offsets into the UTF-8 input, so
//! `&text[mapping.start..mapping.end]` always yields the original sentence
//! span (markers included).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{CitationId, Source, SourceId};

/// Inline tag the writer uses for sentences that need no citation.
pub const COMMON_KNOWLEDGE_MARKER: &str = "[COMMON]";

/// Maximum number of characters of a sentence quoted in a validation issue.
const EXCERPT_CHARS: usize = 50;

/// `[1]`, `[1,2]`, `[1, 2, 3]`.
static CITATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("static regex"));

/// A citation or common-knowledge marker glued to the end of a sentence,
/// e.g. the `[2]` in `"... as shown.[2] Next"`.
static TRAILING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(?:\d+(?:\s*,\s*\d+)*|COMMON)\]").expect("static regex"));

/// Any marker that must not count towards readability statistics.
static ANY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[(?:\d+(?:\s*,\s*\d+)*|COMMON)\]").expect("static regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One bibliography entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based position in the source list.
    pub citation_id: CitationId,
    /// The cited source.
    pub source_id: SourceId,
    /// Source title.
    pub title: String,
    /// Source author, when known.
    pub author: Option<String>,
    /// Publication date, when known.
    pub published_date: Option<String>,
    /// Source URL.
    pub url: String,
    /// Date the source was fetched (`YYYY-MM-DD`).
    pub accessed_date: String,
}

/// The citations attached to one sentence of the article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceCitationMapping {
    /// Sentence text, with any common-knowledge marker removed.
    pub sentence: String,
    /// Byte offset of the sentence start in the mapped text.
    pub start: usize,
    /// Byte offset one past the sentence end in the mapped text.
    pub end: usize,
    /// Sorted, de-duplicated ids referenced by markers in the sentence.
    pub citation_ids: Vec<CitationId>,
    /// Whether the sentence is tagged or recognised as common knowledge.
    pub is_common_knowledge: bool,
}

impl SentenceCitationMapping {
    /// A sentence counts as covered when it cites something or is common knowledge.
    pub fn is_covered(&self) -> bool {
        !self.citation_ids.is_empty() || self.is_common_knowledge
    }
}

/// Bibliography plus sentence-level citation associations for one article.
///
/// Bibliography ids are always exactly `1..=N` in source order. Ids referenced
/// by sentence mappings *should* exist in the bibliography but this is not
/// guaranteed by construction; see [`validate_citations`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationMap {
    /// One entry per source, in source order.
    pub bibliography: Vec<Citation>,
    /// One entry per sentence, in text order.
    pub sentence_mappings: Vec<SentenceCitationMapping>,
    /// Covered sentences / total sentences; 0.0 when there are no sentences.
    pub coverage_rate: f64,
}

/// A sentence span located by [`split_sentences`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceSpan<'a> {
    /// The trimmed sentence text.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

/// One bracketed marker found by [`extract_citation_markers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationMarker {
    /// Byte offset of the opening bracket.
    pub offset: usize,
    /// Ids listed inside the brackets, in written order.
    pub ids: Vec<u32>,
}

/// An integrity problem found by [`validate_citations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CitationIssue {
    /// A sentence references an id with no bibliography entry.
    UnknownCitationId {
        /// The offending id.
        citation_id: CitationId,
        /// The beginning of the sentence containing the marker.
        excerpt: String,
    },
    /// Sentences with neither a citation nor a common-knowledge tag.
    UncitedSentences {
        /// How many such sentences exist.
        count: usize,
    },
}

impl std::fmt::Display for CitationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCitationId { citation_id, excerpt } => {
                write!(f, "Invalid citation ID [{citation_id}] in sentence: {excerpt}...")
            }
            Self::UncitedSentences { count } => write!(
                f,
                "{count} sentences lack citations and are not marked as common knowledge"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Finds every `[n]` / `[n, m, ...]` marker in `text`.
///
/// Adjacent markers (`[2][3]`) are reported separately. Numbers too large for
/// a `u32` are skipped.
pub fn extract_citation_markers(text: &str) -> Vec<CitationMarker> {
    CITATION_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let list = caps.get(1)?;
            let ids = list
                .as_str()
                .split(',')
                .filter_map(|n| n.trim().parse::<u32>().ok())
                .collect::<Vec<_>>();
            Some(CitationMarker { offset: whole.start(), ids })
        })
        .collect()
}

/// Segments `text` into sentences.
///
/// A sentence ends at a run of `.`, `!` or `?` (optionally followed by closing
/// quotes/parentheses or markers glued to the punctuation) that is itself
/// followed by whitespace or the end of the text. Text after the last boundary
/// forms a final sentence. Spans are trimmed; blank spans are skipped.
pub fn split_sentences(text: &str) -> Vec<SentenceSpan<'_>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;

    // Terminal punctuation is ASCII, so byte scanning never splits a character.
    while i < bytes.len() {
        if !is_terminal(bytes[i]) {
            i += 1;
            continue;
        }
        let mut end = i + 1;
        while end < bytes.len() && is_terminal(bytes[end]) {
            end += 1;
        }
        end = consume_trailers(text, end);
        let at_boundary = text[end..].chars().next().map_or(true, char::is_whitespace);
        if at_boundary {
            push_span(text, start, end, &mut spans);
            start = end;
        }
        i = end;
    }
    push_span(text, start, text.len(), &mut spans);
    spans
}

fn is_terminal(b: u8) -> bool {
    matches!(b, b'.' | b'!' | b'?')
}

fn consume_trailers(text: &str, mut end: usize) -> usize {
    loop {
        let rest = &text[end..];
        match rest.chars().next() {
            Some(c @ ('"' | '\'' | ')' | '\u{201D}' | '\u{2019}')) => end += c.len_utf8(),
            Some('[') => match TRAILING_MARKER.find(rest) {
                Some(m) => end += m.end(),
                None => return end,
            },
            _ => return end,
        }
    }
}

fn push_span<'a>(text: &'a str, start: usize, end: usize, spans: &mut Vec<SentenceSpan<'a>>) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start().len();
    spans.push(SentenceSpan {
        text: trimmed,
        start: start + lead,
        end: start + lead + trimmed.len(),
    });
}

/// Removes citation and common-knowledge markers (and the whitespace before
/// them) so they do not skew word or sentence statistics.
pub fn strip_citation_markers(text: &str) -> String {
    ANY_MARKER.replace_all(text, "").into_owned()
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Builds the citation map for an article body.
///
/// * Citation ids `1..=N` are assigned in `sources` order.
/// * Each sentence records the sorted, de-duplicated ids of its markers.
/// * A sentence containing [`COMMON_KNOWLEDGE_MARKER`] is flagged and the
///   marker is stripped from the stored sentence; a sentence containing any of
///   `common_knowledge_phrases` (case-insensitive) is flagged as well.
///
/// Deterministic for identical inputs. Empty text yields no sentences and a
/// coverage of 0.0.
pub fn build_citation_map(
    text: &str,
    sources: &[Source],
    common_knowledge_phrases: &[String],
) -> CitationMap {
    let bibliography = sources
        .iter()
        .zip(1u32..)
        .map(|(source, id)| Citation {
            citation_id: CitationId::new(id),
            source_id: source.source_id.clone(),
            title: source.title.clone(),
            author: source.author.clone(),
            published_date: source.published_date.clone(),
            url: source.url.clone(),
            accessed_date: source.fetched_at.date_string(),
        })
        .collect::<Vec<_>>();

    let phrases = common_knowledge_phrases
        .iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>();

    let sentence_mappings = split_sentences(text)
        .into_iter()
        .map(|span| map_sentence(span, &phrases))
        .collect::<Vec<_>>();

    let covered = sentence_mappings.iter().filter(|m| m.is_covered()).count();
    let coverage_rate = if sentence_mappings.is_empty() {
        0.0
    } else {
        covered as f64 / sentence_mappings.len() as f64
    };

    tracing::debug!(
        total_sentences = sentence_mappings.len(),
        cited_sentences = covered,
        coverage_rate,
        num_sources = bibliography.len(),
        "citation map created"
    );

    CitationMap { bibliography, sentence_mappings, coverage_rate }
}

fn map_sentence(span: SentenceSpan<'_>, phrases: &[String]) -> SentenceCitationMapping {
    let mut ids = extract_citation_markers(span.text)
        .into_iter()
        .flat_map(|m| m.ids)
        .map(CitationId::new)
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids.dedup();

    let lowered = span.text.to_lowercase();
    let mut is_common = phrases.iter().any(|p| lowered.contains(p.as_str()));
    let mut sentence = span.text.to_string();
    if sentence.contains(COMMON_KNOWLEDGE_MARKER) {
        is_common = true;
        sentence = sentence
            .replace(&format!(" {COMMON_KNOWLEDGE_MARKER}"), "")
            .replace(COMMON_KNOWLEDGE_MARKER, "")
            .trim()
            .to_string();
    }

    SentenceCitationMapping {
        sentence,
        start: span.start,
        end: span.end,
        citation_ids: ids,
        is_common_knowledge: is_common,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Checks the referential integrity of a citation map.
///
/// Reports every referenced id missing from the bibliography (one issue per
/// occurrence) and, once, the number of sentences that are neither cited nor
/// common knowledge. An empty result means the map is fully valid. The map is
/// not modified, and the result is advisory: it does not gate the pipeline.
pub fn validate_citations(map: &CitationMap) -> Vec<CitationIssue> {
    let known = map
        .bibliography
        .iter()
        .map(|c| c.citation_id)
        .collect::<std::collections::HashSet<_>>();

    let mut issues = map
        .sentence_mappings
        .iter()
        .flat_map(|m| {
            m.citation_ids
                .iter()
                .filter(|id| !known.contains(id))
                .map(move |id| CitationIssue::UnknownCitationId {
                    citation_id: *id,
                    excerpt: m.sentence.chars().take(EXCERPT_CHARS).collect(),
                })
        })
        .collect::<Vec<_>>();

    let uncited = map.sentence_mappings.iter().filter(|m| !m.is_covered()).count();
    if uncited > 0 {
        issues.push(CitationIssue::UncitedSentences { count: uncited });
    }

    tracing::debug!(total_issues = issues.len(), uncited_count = uncited, "citations validated");
    issues
}

/// Renders the bibliography as a Markdown "References" section, ordered by id.
pub fn format_bibliography_markdown(citations: &[Citation]) -> String {
    let mut sorted = citations.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|c| c.citation_id);

    let mut lines = vec!["## References\n".to_string()];
    for citation in sorted {
        let mut parts = vec![format!("[{}]", citation.citation_id)];
        if let Some(author) = &citation.author {
            parts.push(format!("{author}."));
        }
        parts.push(format!("\"{}.\"", citation.title));
        if let Some(date) = &citation.published_date {
            parts.push(format!("Published {date}."));
        }
        parts.push(format!("Available at: {}", citation.url));
        if !citation.accessed_date.is_empty() {
            parts.push(format!("(accessed {})", citation.accessed_date));
        }
        lines.push(parts.join(" "));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScrapedPage, Timestamp};

    fn sources(n: usize) -> Vec<Source> {
        (1..=n)
            .map(|i| {
                Source::from_page(
                    ScrapedPage {
                        final_url: format!("https://example{i}.org/article"),
                        raw_text: format!("content {i}"),
                        title: Some(format!("Source {i}")),
                        author: (i == 1).then(|| "Ada Lovelace".to_string()),
                        published_date: None,
                    },
                    Timestamp::now(),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn extracts_single_adjacent_and_list_markers() {
        let markers = extract_citation_markers("A fact [1]. Another [2][3]. Combined [4, 5, 6].");
        let ids = markers.iter().map(|m| m.ids.clone()).collect::<Vec<_>>();
        assert_eq!(ids, vec![vec![1], vec![2], vec![3], vec![4, 5, 6]]);
    }

    #[test]
    fn splits_on_terminal_punctuation_followed_by_whitespace() {
        let text = "First sentence. Second sentence! Third sentence? Fourth.";
        let spans = split_sentences(text);
        let sentences = spans.iter().map(|s| s.text).collect::<Vec<_>>();
        assert_eq!(
            sentences,
            vec!["First sentence.", "Second sentence!", "Third sentence?", "Fourth."]
        );
        for span in &spans {
            assert_eq!(&text[span.start..span.end], span.text);
        }
    }

    #[test]
    fn decimal_points_do_not_end_sentences() {
        let spans = split_sentences("Version 3.14 shipped [1]. It was fast [2].");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "Version 3.14 shipped [1].");
    }

    #[test]
    fn markers_glued_after_punctuation_stay_with_their_sentence() {
        let spans = split_sentences("It compiles.[2] It runs.");
        assert_eq!(spans[0].text, "It compiles.[2]");
        assert_eq!(spans[1].text, "It runs.");
    }

    #[test]
    fn trailing_text_without_punctuation_is_a_sentence() {
        let spans = split_sentences("Done. And then");
        assert_eq!(spans.last().map(|s| s.text), Some("And then"));
    }

    #[test]
    fn bibliography_ids_follow_source_order() {
        let sources = sources(3);
        let map = build_citation_map("Text [1].", &sources, &[]);
        let ids = map.bibliography.iter().map(|c| c.citation_id.as_u32()).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);
        for (citation, source) in map.bibliography.iter().zip(&sources) {
            assert_eq!(citation.source_id, source.source_id);
        }
    }

    #[test]
    fn sentence_ids_are_sorted_and_unique() {
        let map = build_citation_map("Claim [3][1] and again [3, 2].", &sources(3), &[]);
        let ids = map.sentence_mappings[0]
            .citation_ids
            .iter()
            .map(|c| c.as_u32())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn common_marker_is_flagged_and_stripped() {
        let map = build_citation_map("Water is wet [COMMON].", &sources(1), &[]);
        let mapping = &map.sentence_mappings[0];
        assert!(mapping.is_common_knowledge);
        assert_eq!(mapping.sentence, "Water is wet.");
        assert_eq!(map.coverage_rate, 1.0);
    }

    #[test]
    fn common_knowledge_phrases_match_case_insensitively() {
        let phrases = vec!["the sky is blue".to_string()];
        let map = build_citation_map("The Sky Is Blue on clear days.", &sources(1), &phrases);
        assert!(map.sentence_mappings[0].is_common_knowledge);
    }

    #[test]
    fn coverage_is_one_when_every_sentence_is_covered() {
        let map = build_citation_map("One [1]. Two [COMMON]. Three [1, 2].", &sources(2), &[]);
        assert_eq!(map.coverage_rate, 1.0);
    }

    #[test]
    fn coverage_counts_uncited_sentences() {
        let map = build_citation_map("One [1]. Two. Three. Four [2].", &sources(2), &[]);
        assert_eq!(map.coverage_rate, 0.5);
    }

    #[test]
    fn empty_text_has_zero_coverage() {
        let map = build_citation_map("", &sources(2), &[]);
        assert!(map.sentence_mappings.is_empty());
        assert_eq!(map.coverage_rate, 0.0);
        assert_eq!(map.bibliography.len(), 2);
    }

    #[test]
    fn mapping_is_deterministic() {
        let text = "Alpha [1]. Beta [COMMON]. Gamma? Delta [2][9].";
        let phrases = vec!["gamma".to_string()];
        let sources = sources(2);
        let first = build_citation_map(text, &sources, &phrases);
        let second = build_citation_map(text, &sources, &phrases);
        assert_eq!(first.sentence_mappings, second.sentence_mappings);
        assert_eq!(first.coverage_rate, second.coverage_rate);
    }

    #[test]
    fn validator_reports_unknown_id_once() {
        let map = build_citation_map("Cited [1]. Bad [99].", &sources(1), &[]);
        let issues = validate_citations(&map);
        assert_eq!(issues.len(), 1);
        match &issues[0] {
            CitationIssue::UnknownCitationId { citation_id, .. } => {
                assert_eq!(citation_id.as_u32(), 99);
            }
            other => panic!("unexpected issue {other:?}"),
        }
        assert!(issues[0].to_string().contains("Invalid citation ID [99]"));
    }

    #[test]
    fn validator_aggregates_uncited_sentences() {
        let text = "This sentence has a citation [1].\nNo citation here.\nNor here.\nCommon [COMMON].";
        let map = build_citation_map(text, &sources(1), &[]);
        let issues = validate_citations(&map);
        assert_eq!(issues, vec![CitationIssue::UncitedSentences { count: 2 }]);
        assert!(issues[0].to_string().contains("lack citations"));
    }

    #[test]
    fn validator_accepts_a_fully_valid_map() {
        let map = build_citation_map("Fact [1]. Another fact [2].", &sources(2), &[]);
        assert!(validate_citations(&map).is_empty());
    }

    #[test]
    fn strip_removes_all_marker_forms() {
        assert_eq!(
            strip_citation_markers("Fast [1]. Safe [2, 3][4]. Known [COMMON]."),
            "Fast. Safe. Known."
        );
    }

    #[test]
    fn bibliography_markdown_lists_entries_in_id_order() {
        let map = build_citation_map("", &sources(2), &[]);
        let rendered = format_bibliography_markdown(&map.bibliography);
        assert!(rendered.starts_with("## References\n\n[1] Ada Lovelace. \"Source 1.\""));
        assert!(rendered.contains("[2] \"Source 2.\" Available at: https://example2.org/article"));
    }
}
