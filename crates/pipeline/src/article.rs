//! Writing products: draft sections, the composed article, SEO metadata and
//! per-run resource totals.

use serde::{Deserialize, Serialize};

use crate::citation::format_bibliography_markdown;
use crate::quality::{flesch_reading_ease, word_count, NEUTRAL_READING_LEVEL};
use crate::{strip_citation_markers, CitationMap, Claim, TokenCount};

/// Longest SEO title accepted.
pub const SEO_TITLE_MAX_CHARS: usize = 60;

/// Accepted meta-description length range, in characters.
pub const META_DESCRIPTION_CHARS: std::ops::RangeInclusive<usize> = 150..=160;

/// One drafted outline section with the claims extracted from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSection {
    /// The outline section this draft covers.
    pub section_title: String,
    /// Drafted Markdown, including citation markers.
    pub content: String,
    /// Claims extracted from `content`.
    pub claims: Vec<Claim>,
    /// Words in `content`.
    pub word_count: usize,
}

impl DraftSection {
    /// Creates a draft and counts its words.
    pub fn new(section_title: impl Into<String>, content: impl Into<String>, claims: Vec<Claim>) -> Self {
        let content = content.into();
        Self {
            section_title: section_title.into(),
            word_count: word_count(&strip_citation_markers(&content)),
            content,
            claims,
        }
    }
}

/// The composed article.
///
/// `body` never contains the bibliography; [`Article::rendered`] appends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Article title.
    pub title: String,
    /// Markdown body with inline citation markers.
    pub body: String,
    /// Citation map built from `body`.
    pub citations: CitationMap,
    /// Words in `body`, markers excluded.
    pub word_count: usize,
    /// Flesch reading ease of `body`, markers excluded.
    pub reading_level: f64,
}

impl Article {
    /// Creates an article, deriving word count and reading level from `body`.
    pub fn new(title: impl Into<String>, body: impl Into<String>, citations: CitationMap) -> Self {
        let body = body.into();
        let plain = strip_citation_markers(&body);
        Self {
            title: title.into(),
            word_count: word_count(&plain),
            reading_level: flesch_reading_ease(&plain).unwrap_or(NEUTRAL_READING_LEVEL),
            body,
            citations,
        }
    }

    /// The body followed by a "References" section.
    pub fn rendered(&self) -> String {
        if self.citations.bibliography.is_empty() {
            return self.body.clone();
        }
        format!(
            "{}\n\n{}",
            self.body.trim_end(),
            format_bibliography_markdown(&self.citations.bibliography)
        )
    }
}

/// A suggested link to related content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalLink {
    /// Link text.
    pub anchor: String,
    /// The topic the link should point to.
    pub topic: String,
}

/// Search-engine metadata for the finished article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeoMetadata {
    /// Page title, at most [`SEO_TITLE_MAX_CHARS`] characters.
    pub title: String,
    /// URL slug.
    pub slug: String,
    /// Meta description, within [`META_DESCRIPTION_CHARS`].
    pub meta_description: String,
    /// Target keywords.
    pub keywords: Vec<String>,
    /// Main heading.
    pub h1: String,
    /// Second-level headings found in the body.
    pub h2_headings: Vec<String>,
    /// Related-content link suggestions.
    pub internal_links: Vec<InternalLink>,
    /// schema.org `Article` structured data.
    pub json_ld: serde_json::Value,
}

/// Resource totals for one run, recorded at finalisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Wall-clock duration of the run.
    pub elapsed_seconds: f64,
    /// Prompt plus completion tokens across all model calls.
    pub total_tokens: TokenCount,
    /// Number of model-inference calls.
    pub total_calls: u64,
}

/// Lower-case, hyphen-separated slug of `text` (ASCII alphanumerics only).
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Text of every `## ` heading in a Markdown document, in order.
pub fn extract_h2_headings(markdown: &str) -> Vec<String> {
    markdown
        .lines()
        .filter_map(|line| line.strip_prefix("## "))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect()
}

/// Builds a schema.org `Article` object for the rendered page.
pub fn article_json_ld(
    headline: &str,
    description: &str,
    keywords: &[String],
    date_published: &str,
    word_count: usize,
) -> serde_json::Value {
    serde_json::json!({
        "@context": "https://schema.org",
        "@type": "Article",
        "headline": headline,
        "description": description,
        "keywords": keywords.join(", "),
        "datePublished": date_published,
        "wordCount": word_count,
        "author": { "@type": "Organization", "name": "Scrivener" },
    })
}
