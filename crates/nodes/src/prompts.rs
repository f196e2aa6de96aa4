//! System prompts and user-prompt builders for the model-backed stages.

use pipeline::{DraftSection, Outline, OutlineSection, RetrievedChunk, Source, TopicSpec, Verdict};

const BASE: &str = "You are a professional research assistant helping to create high-quality, well-cited articles.

Core principles:
- Accuracy: never invent facts or citations
- Citations: every non-obvious claim must be supported by sources
- Clarity: write for the specified audience
- Objectivity: present multiple perspectives when appropriate";

pub fn planner_system() -> String {
    format!(
        "{BASE}

Your role: Topic Planner. Create a comprehensive outline with clear section titles, the key \
questions each section answers, the claims it will need to verify, and target keywords."
    )
}

pub fn drafter_system() -> String {
    format!(
        "{BASE}

Your role: Section Drafter. Draft section content from the retrieved sources. Use inline bracket \
citations such as [1] or [2][3] for every non-obvious claim, and only cite the numbered sources \
provided."
    )
}

pub const CLAIM_EXTRACTOR_SYSTEM: &str = "You are a fact-checking assistant. Extract atomic, verifiable claims.";

pub fn fact_checker_system() -> String {
    format!(
        "{BASE}

Your role: Fact-Checker. Assess each claim against the evidence:
- supported: clear evidence supports the claim (confidence >= 0.7)
- refuted: evidence contradicts the claim
- needs_more_evidence: evidence is missing, insufficient or conflicting
- common_knowledge: widely known, no citation needed
Quote evidence verbatim. When in doubt, answer needs_more_evidence."
    )
}

pub fn writer_system() -> String {
    format!(
        "{BASE}

Your role: Narrative Writer. Every sentence must either carry inline citations like [1] or [2][3], \
or be tagged [COMMON] when it is common knowledge (use sparingly). Never invent citation numbers."
    )
}

pub fn editor_system() -> String {
    format!(
        "{BASE}

Your role: Style Editor. Fix grammar, improve flow, remove redundancy, and keep a consistent tone. \
Preserve every citation marker such as [1] and every [COMMON] tag exactly; never renumber them."
    )
}

pub fn seo_system() -> String {
    format!(
        "{BASE}

Your role: SEO Specialist. Produce a title of at most 60 characters, a URL slug, a meta \
description of 150 to 160 characters, 5 to 10 keywords, an H1, and 3 to 5 internal link ideas."
    )
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

/// Numbered source list; the numbers are the citation ids.
pub fn numbered_sources(sources: &[Source]) -> String {
    sources
        .iter()
        .zip(1..)
        .map(|(s, n): (&Source, u32)| {
            format!(
                "[{n}] {}\n   URL: {}\n   Author: {}\n   Date: {}",
                s.title,
                s.url,
                s.author.as_deref().unwrap_or("Unknown"),
                s.published_date.as_deref().unwrap_or("N/A")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn chunk_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| {
            format!(
                "[{}] {}\n{}",
                c.source_id,
                c.metadata.get("title").map(String::as_str).unwrap_or("Unknown"),
                c.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

pub fn plan(topic: &TopicSpec) -> String {
    let constraints = topic
        .constraints
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>();
    format!(
        "Create an article outline.

TOPIC: {}
AUDIENCE: {}

GOALS:
{}

KEYWORDS:
{}

CONSTRAINTS:
{}

Plan 3 to 6 sections. For each section give a title, 2 to 4 key questions, the claims it will \
make, and an estimated word count.",
        topic.topic,
        topic.audience,
        bullet_list(&topic.goals),
        bullet_list(&topic.keywords),
        bullet_list(&constraints)
    )
}

/// Retrieval query for a section: its title followed by its key questions.
pub fn section_query(section: &OutlineSection) -> String {
    format!("{}. {}", section.title, section.key_questions.join(" "))
}

pub fn draft_section(section: &OutlineSection, sources: &[Source], context: &[RetrievedChunk]) -> String {
    format!(
        "Draft content for this section.

SECTION: {}

KEY QUESTIONS:
{}

TARGET LENGTH: about {} words

AVAILABLE SOURCES:
{}

RELEVANT CONTEXT:
{}

Only cite sources numbered 1-{}. Draft the section now.",
        section.title,
        bullet_list(&section.key_questions),
        section.estimated_words,
        numbered_sources(sources),
        chunk_context(context),
        sources.len()
    )
}

pub fn extract_claims(draft: &str) -> String {
    format!(
        "Extract atomic, verifiable claims from this draft. Make each claim specific and testable, \
list the sources that may support it, and say whether it needs a citation.

{draft}"
    )
}

pub fn fact_check(claim: &str, evidence: &[RetrievedChunk]) -> String {
    format!(
        "Verify this claim against the evidence.

CLAIM: {claim}

EVIDENCE:
{}",
        chunk_context(evidence)
    )
}

pub fn write(outline: &Outline, drafts: &[DraftSection], sources: &[Source], verified: &[&Verdict]) -> String {
    let claims = verified
        .iter()
        .map(|v| format!("- {} [{}, confidence {}]", v.claim_text, v.outcome, v.confidence))
        .collect::<Vec<_>>()
        .join("\n");
    let sections = drafts
        .iter()
        .map(|d| format!("## {}\n\n{}", d.section_title, d.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Compose a complete, coherent article.

TITLE: {title}

VERIFIED CLAIMS:
{claims}

DRAFT SECTIONS:
{sections}

SOURCES FOR CITATION:
{sources}

Every sentence must cite sources numbered 1-{count} or be tagged [COMMON]. Start with \
\"# {title}\" and use ## subheadings. Do not include a bibliography.",
        title = outline.title,
        sources = numbered_sources(sources),
        count = sources.len()
    )
}

pub fn edit(body: &str, audience: &str, target_reading_level: f64) -> String {
    format!(
        "Edit this article for an audience of {audience}. Aim for a Flesch reading ease of about \
{target_reading_level:.0}. Return only the edited Markdown.

{body}"
    )
}

pub fn seo(title: &str, body: &str, headings: &[String], word_count: usize) -> String {
    let preview = body.chars().take(1000).collect::<String>();
    format!(
        "Create SEO metadata for this article.

TITLE: {title}

CONTENT PREVIEW:
{preview}...

H2 HEADINGS:
{}

WORD COUNT: {word_count}",
        bullet_list(headings)
    )
}
