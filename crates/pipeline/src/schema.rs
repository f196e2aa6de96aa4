//! Typed response schemas for structured (JSON-mode) model output.
//!
//! Every JSON shape a stage expects from the model is a type implementing
//! [`ResponseSchema`]. Validation is pure: `validate(&Value)` either yields the
//! typed value or a [`SchemaError`] whose display text is fed back to the model
//! as corrective feedback by the gateway in the `nodes` crate.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::article::{InternalLink, META_DESCRIPTION_CHARS, SEO_TITLE_MAX_CHARS};
use crate::{Claim, Confidence, Outline, VerdictOutcome};

/// A JSON response did not conform to its schema.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    /// The model output was not a JSON document.
    #[error("response is not valid JSON: {message}")]
    NotJson { message: String },

    /// The JSON could not be deserialised into the expected shape.
    #[error("{schema}: {message}")]
    Shape { schema: &'static str, message: String },

    /// A field is present but violates a constraint.
    #[error("{schema}.{field}: {message}")]
    Constraint {
        schema: &'static str,
        field: &'static str,
        message: String,
    },
}

/// A JSON response shape with a pure validation function.
pub trait ResponseSchema: Sized {
    /// Schema name used in model instructions and logs.
    const NAME: &'static str;

    /// Example of the expected JSON, shown to the model.
    const SHAPE: &'static str;

    /// Checks `value` and converts it into the typed response.
    fn validate(value: &serde_json::Value) -> Result<Self, SchemaError>;
}

/// Parses raw model text as JSON, then validates it as `T`.
pub fn parse_response<T: ResponseSchema>(raw: &str) -> Result<T, SchemaError> {
    let value: serde_json::Value =
        serde_json::from_str(raw.trim()).map_err(|e| SchemaError::NotJson { message: e.to_string() })?;
    T::validate(&value)
}

fn deserialize<T: DeserializeOwned>(schema: &'static str, value: &serde_json::Value) -> Result<T, SchemaError> {
    T::deserialize(value).map_err(|e| SchemaError::Shape {
        schema,
        message: e.to_string(),
    })
}

fn constraint(schema: &'static str, field: &'static str, message: impl Into<String>) -> SchemaError {
    SchemaError::Constraint {
        schema,
        field,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

/// Planner output: an [`Outline`] with at least one titled section.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineResponse(pub Outline);

impl ResponseSchema for OutlineResponse {
    const NAME: &'static str = "Outline";
    const SHAPE: &'static str = r#"{"title": "string", "sections": [{"title": "string", "key_questions": ["string"], "expected_claims": ["string"], "estimated_words": 400}], "target_keywords": ["string"], "estimated_total_words": 2000, "rationale": "string"}"#;

    fn validate(value: &serde_json::Value) -> Result<Self, SchemaError> {
        let outline: Outline = deserialize(Self::NAME, value)?;
        if outline.title.trim().is_empty() {
            return Err(constraint(Self::NAME, "title", "must not be empty"));
        }
        if outline.sections.is_empty() {
            return Err(constraint(Self::NAME, "sections", "must contain at least one section"));
        }
        if outline.sections.iter().any(|s| s.title.trim().is_empty()) {
            return Err(constraint(Self::NAME, "sections", "every section needs a title"));
        }
        Ok(Self(outline))
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawClaim {
    text: String,
    #[serde(default)]
    evidence_candidates: Vec<String>,
    #[serde(default = "default_true")]
    needs_citation: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct RawClaimList {
    claims: Vec<RawClaim>,
}

/// Claim-extraction output. Blank claims are dropped; ids are derived from
/// the claim text, never taken from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimListResponse(pub Vec<Claim>);

impl ResponseSchema for ClaimListResponse {
    const NAME: &'static str = "ClaimList";
    const SHAPE: &'static str =
        r#"{"claims": [{"text": "string", "evidence_candidates": ["string"], "needs_citation": true}]}"#;

    fn validate(value: &serde_json::Value) -> Result<Self, SchemaError> {
        let raw: RawClaimList = deserialize(Self::NAME, value)?;
        let claims = raw
            .claims
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .map(|c| {
                let mut claim = Claim::new(c.text);
                claim.evidence_candidates = c.evidence_candidates;
                claim.needs_citation = c.needs_citation;
                claim
            })
            .collect();
        Ok(Self(claims))
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

/// A quote the fact-checker offers as evidence. Only quotes found in a
/// retrieved chunk become evidence pointers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuotedEvidence {
    #[serde(default)]
    pub quote: String,
    #[serde(default = "default_relevance")]
    pub relevance: f64,
}

fn default_relevance() -> f64 {
    1.0
}

#[derive(Deserialize)]
struct RawVerdict {
    #[serde(alias = "outcome")]
    verdict: VerdictOutcome,
    confidence: f64,
    #[serde(default)]
    evidence: Vec<QuotedEvidence>,
    #[serde(default)]
    reasoning: String,
}

/// Fact-check output for one claim.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictResponse {
    pub outcome: VerdictOutcome,
    pub confidence: Confidence,
    pub evidence: Vec<QuotedEvidence>,
    pub reasoning: String,
}

impl ResponseSchema for VerdictResponse {
    const NAME: &'static str = "Verdict";
    const SHAPE: &'static str = r#"{"verdict": "supported|refuted|needs_more_evidence|common_knowledge", "confidence": 0.0, "evidence": [{"quote": "string", "relevance": 1.0}], "reasoning": "string"}"#;

    fn validate(value: &serde_json::Value) -> Result<Self, SchemaError> {
        let raw: RawVerdict = deserialize(Self::NAME, value)?;
        let confidence = Confidence::new(raw.confidence).ok_or_else(|| {
            constraint(
                Self::NAME,
                "confidence",
                format!("{} is outside [0.0, 1.0]", raw.confidence),
            )
        })?;
        Ok(Self {
            outcome: raw.verdict,
            confidence,
            evidence: raw.evidence,
            reasoning: raw.reasoning,
        })
    }
}

// ---------------------------------------------------------------------------
// SEO
// ---------------------------------------------------------------------------

/// SEO output. The slug may be blank; the SEO stage falls back to a slug of
/// the article title.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeoResponse {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    pub meta_description: String,
    pub keywords: Vec<String>,
    pub h1: String,
    #[serde(default)]
    pub internal_links: Vec<InternalLink>,
}

impl ResponseSchema for SeoResponse {
    const NAME: &'static str = "SEOMetadata";
    const SHAPE: &'static str = r#"{"title": "string (max 60 chars)", "slug": "string", "meta_description": "string (150-160 chars)", "keywords": ["string"], "h1": "string", "internal_links": [{"anchor": "string", "topic": "string"}]}"#;

    fn validate(value: &serde_json::Value) -> Result<Self, SchemaError> {
        let seo: SeoResponse = deserialize(Self::NAME, value)?;
        let title_len = seo.title.chars().count();
        if title_len == 0 || title_len > SEO_TITLE_MAX_CHARS {
            return Err(constraint(
                Self::NAME,
                "title",
                format!("must be 1-{SEO_TITLE_MAX_CHARS} characters, got {title_len}"),
            ));
        }
        let description_len = seo.meta_description.chars().count();
        if !META_DESCRIPTION_CHARS.contains(&description_len) {
            return Err(constraint(
                Self::NAME,
                "meta_description",
                format!(
                    "must be {}-{} characters, got {description_len}",
                    META_DESCRIPTION_CHARS.start(),
                    META_DESCRIPTION_CHARS.end()
                ),
            ));
        }
        Ok(seo)
    }
}
