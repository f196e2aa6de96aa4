//! Claims extracted from drafted text and the fact-check verdicts on them.

use serde::{Deserialize, Serialize};

use crate::{ChunkId, ClaimId, Confidence, SourceId};

/// An atomic, verifiable statement extracted from drafted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Hash of the claim text.
    pub claim_id: ClaimId,
    /// The statement itself.
    pub text: String,
    /// Free-text hints from the drafter about which sources support the claim.
    #[serde(default)]
    pub evidence_candidates: Vec<String>,
    /// Whether the drafter believes the claim requires a citation.
    #[serde(default = "default_true")]
    pub needs_citation: bool,
}

fn default_true() -> bool {
    true
}

impl Claim {
    /// Creates a claim whose id is derived from its text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into().trim().to_string();
        Self {
            claim_id: ClaimId::from_text(&text),
            text,
            evidence_candidates: Vec::new(),
            needs_citation: true,
        }
    }
}

/// The adjudicated truth status of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOutcome {
    /// Clear evidence supports the claim.
    #[serde(alias = "SUPPORTED")]
    Supported,
    /// Evidence contradicts the claim.
    #[serde(alias = "REFUTED")]
    Refuted,
    /// Evidence is missing, insufficient or conflicting.
    #[serde(alias = "needs-more-evidence", alias = "NEEDS_MORE_EVIDENCE")]
    NeedsMoreEvidence,
    /// Widely known; no citation required.
    #[serde(alias = "common-knowledge", alias = "COMMON_KNOWLEDGE")]
    CommonKnowledge,
}

impl VerdictOutcome {
    /// `true` for outcomes counted by the unsupported-claim rate.
    pub fn is_unsupported(self) -> bool {
        matches!(self, Self::Refuted | Self::NeedsMoreEvidence)
    }

    /// `true` for outcomes the writer may build on.
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Supported | Self::CommonKnowledge)
    }

    /// Stable lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supported => "supported",
            Self::Refuted => "refuted",
            Self::NeedsMoreEvidence => "needs_more_evidence",
            Self::CommonKnowledge => "common_knowledge",
        }
    }
}

impl std::fmt::Display for VerdictOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pointer from a verdict to the retrieved passage that backs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePointer {
    /// The source the passage came from.
    pub source_id: SourceId,
    /// The chunk that contains the quote.
    pub chunk_id: ChunkId,
    /// The quoted text.
    pub quote: String,
    /// Relevance of the quote to the claim, as judged by the fact-checker.
    pub relevance: f64,
}

/// One verdict per claim; immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The claim this verdict adjudicates.
    pub claim_id: ClaimId,
    /// The claim text, carried for prompts and reports.
    pub claim_text: String,
    /// The outcome.
    pub outcome: VerdictOutcome,
    /// How sure the fact-checker is.
    pub confidence: Confidence,
    /// Passages backing the outcome.
    pub evidence: Vec<EvidencePointer>,
    /// The fact-checker's explanation.
    pub reasoning: String,
}
