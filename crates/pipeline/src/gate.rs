//! The quality gate: threshold comparison, recommendations and retry
//! eligibility.
//!
//! A failed gate is data, not an error. [`evaluate_gate`] always returns a
//! [`GateDecision`]; the executor reads [`should_retry`] to choose between the
//! retry edge and finalisation.

use serde::{Deserialize, Serialize};

use crate::{QualityMetrics, Verdict, VerdictOutcome};

/// Name recorded on every decision produced by [`evaluate_gate`].
pub const QUALITY_GATE_NAME: &str = "quality_gate";

/// Failure categories the retry strategy knows how to address. Matched
/// case-insensitively as substrings of the failure reasons.
const RETRYABLE_FAILURES: &[&str] = &["citation coverage", "unsupported claims", "fact confidence"];

/// Reading-ease band outside which an advisory recommendation is added.
const READING_LEVEL_MIN: f64 = 50.0;
const READING_LEVEL_MAX: f64 = 80.0;

/// Thresholds the gate compares metrics against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    /// Minimum fraction of covered sentences.
    pub min_citation_coverage: f64,
    /// Maximum fraction of refuted or under-evidenced claims.
    pub max_unsupported_claim_rate: f64,
    /// Minimum mean verdict confidence.
    pub min_fact_confidence: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_citation_coverage: 0.95,
            max_unsupported_claim_rate: 0.05,
            min_fact_confidence: 0.70,
        }
    }
}

/// The outcome of one gate evaluation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    /// `true` iff every threshold was met.
    pub passed: bool,
    /// Which gate produced the decision.
    pub gate_name: String,
    /// The metrics the decision was based on.
    pub metrics: QualityMetrics,
    /// One entry per violated threshold, stating actual vs threshold.
    pub failure_reasons: Vec<String>,
    /// Remediation hints, including advisories on a passing gate.
    pub recommendations: Vec<String>,
    /// The retry count at the time of evaluation.
    pub retry_count: u32,
}

/// Compares `metrics` to `thresholds`.
///
/// Each violated threshold contributes exactly one failure reason and one
/// generic recommendation. Reading level outside `[50, 80]` adds an advisory
/// recommendation but never fails the gate. On failure, the verdict list adds
/// targeted recommendations for under-evidenced and refuted claims.
pub fn evaluate_gate(
    metrics: QualityMetrics,
    verdicts: &[Verdict],
    thresholds: &GateThresholds,
    retry_count: u32,
) -> GateDecision {
    let mut failure_reasons = Vec::new();
    let mut recommendations = Vec::new();

    if metrics.citation_coverage < thresholds.min_citation_coverage {
        failure_reasons.push(format!(
            "Citation coverage {:.1}% below threshold {:.1}%",
            metrics.citation_coverage * 100.0,
            thresholds.min_citation_coverage * 100.0
        ));
        recommendations
            .push("Add citations to uncited sentences or mark them as common knowledge".to_string());
    }

    if metrics.unsupported_claim_rate > thresholds.max_unsupported_claim_rate {
        failure_reasons.push(format!(
            "Unsupported claims at {:.1}% exceed threshold {:.1}%",
            metrics.unsupported_claim_rate * 100.0,
            thresholds.max_unsupported_claim_rate * 100.0
        ));
        recommendations.push("Find additional sources for unsupported claims or remove them".to_string());
    }

    if metrics.avg_fact_confidence < thresholds.min_fact_confidence {
        failure_reasons.push(format!(
            "Average fact confidence {:.2} below threshold {:.2}",
            metrics.avg_fact_confidence, thresholds.min_fact_confidence
        ));
        recommendations
            .push("Strengthen claims with better evidence or use more authoritative sources".to_string());
    }

    if metrics.reading_level < READING_LEVEL_MIN {
        recommendations.push(format!(
            "Reading level {:.1} is too difficult; simplify sentence structure and vocabulary",
            metrics.reading_level
        ));
    } else if metrics.reading_level > READING_LEVEL_MAX {
        recommendations.push(format!(
            "Reading level {:.1} is too simple; add more depth and technical detail",
            metrics.reading_level
        ));
    }

    let passed = failure_reasons.is_empty();
    if !passed {
        let needs_evidence = count_outcome(verdicts, VerdictOutcome::NeedsMoreEvidence);
        if needs_evidence > 0 {
            recommendations.push(format!(
                "Find supporting evidence for {needs_evidence} claims that need more evidence"
            ));
        }
        let refuted = count_outcome(verdicts, VerdictOutcome::Refuted);
        if refuted > 0 {
            recommendations.push(format!("Remove or correct {refuted} refuted claims"));
        }
    }

    GateDecision {
        passed,
        gate_name: QUALITY_GATE_NAME.to_string(),
        metrics,
        failure_reasons,
        recommendations,
        retry_count,
    }
}

fn count_outcome(verdicts: &[Verdict], outcome: VerdictOutcome) -> usize {
    verdicts.iter().filter(|v| v.outcome == outcome).count()
}

/// Decides whether a failed gate should trigger another retry pass.
///
/// `false` when the gate passed or the retry bound is reached; otherwise
/// `true` only when a failure reason names a category the retry strategy
/// addresses.
pub fn should_retry(decision: &GateDecision, retry_count: u32, max_retries: u32) -> bool {
    if decision.passed || retry_count >= max_retries {
        return false;
    }
    decision.failure_reasons.iter().any(|reason| {
        let lower = reason.to_lowercase();
        RETRYABLE_FAILURES.iter().any(|category| lower.contains(category))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Claim, Confidence};

    fn metrics(coverage: f64, unsupported: f64, confidence: f64) -> QualityMetrics {
        QualityMetrics {
            citation_coverage: coverage,
            unsupported_claim_rate: unsupported,
            avg_fact_confidence: confidence,
            reading_level: 60.0,
            total_claims: 10,
            total_sources: 5,
            total_citations: 5,
        }
    }

    fn verdict(outcome: VerdictOutcome) -> Verdict {
        let claim = Claim::new(format!("a {outcome} claim"));
        Verdict {
            claim_id: claim.claim_id,
            claim_text: claim.text,
            outcome,
            confidence: Confidence::new(0.5).unwrap(),
            evidence: vec![],
            reasoning: String::new(),
        }
    }

    #[test]
    fn passing_metrics_pass() {
        let decision = evaluate_gate(metrics(0.98, 0.02, 0.85), &[], &GateThresholds::default(), 0);
        assert!(decision.passed);
        assert!(decision.failure_reasons.is_empty());
        assert_eq!(decision.gate_name, QUALITY_GATE_NAME);
    }

    #[test]
    fn low_coverage_fails_with_one_reason() {
        let decision = evaluate_gate(metrics(0.70, 0.02, 0.85), &[], &GateThresholds::default(), 0);
        assert!(!decision.passed);
        assert_eq!(decision.failure_reasons.len(), 1);
        assert!(decision.failure_reasons[0].contains("Citation coverage"));
        assert!(!decision.recommendations.is_empty());
    }

    #[test]
    fn each_violation_adds_one_reason_and_recommendation() {
        let decision = evaluate_gate(metrics(0.5, 0.5, 0.5), &[], &GateThresholds::default(), 1);
        assert_eq!(decision.failure_reasons.len(), 3);
        assert_eq!(decision.recommendations.len(), 3);
        assert_eq!(decision.retry_count, 1);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let decision = evaluate_gate(metrics(0.95, 0.05, 0.70), &[], &GateThresholds::default(), 0);
        assert!(decision.passed);
    }

    #[test]
    fn reading_level_is_advisory_only() {
        let mut m = metrics(0.98, 0.0, 0.9);
        m.reading_level = 20.0;
        let decision = evaluate_gate(m, &[], &GateThresholds::default(), 0);
        assert!(decision.passed);
        assert_eq!(decision.recommendations.len(), 1);
        assert!(decision.recommendations[0].contains("too difficult"));

        m.reading_level = 95.0;
        let decision = evaluate_gate(m, &[], &GateThresholds::default(), 0);
        assert!(decision.passed);
        assert!(decision.recommendations[0].contains("too simple"));
    }

    #[test]
    fn verdicts_add_targeted_recommendations_on_failure() {
        let verdicts = vec![
            verdict(VerdictOutcome::NeedsMoreEvidence),
            verdict(VerdictOutcome::Refuted),
            verdict(VerdictOutcome::Supported),
        ];
        let failing = evaluate_gate(metrics(0.98, 0.66, 0.85), &verdicts, &GateThresholds::default(), 0);
        assert_eq!(failing.recommendations.len(), 3);

        let passing = evaluate_gate(metrics(0.98, 0.0, 0.85), &verdicts, &GateThresholds::default(), 0);
        assert!(passing.recommendations.is_empty());
    }

    #[test]
    fn retry_until_bound() {
        let decision = evaluate_gate(metrics(0.70, 0.02, 0.85), &[], &GateThresholds::default(), 0);
        assert!(should_retry(&decision, 0, 2));
        assert!(should_retry(&decision, 1, 2));
        assert!(!should_retry(&decision, 2, 2));
    }

    #[test]
    fn every_failure_category_is_retryable() {
        for m in [metrics(0.5, 0.0, 0.9), metrics(1.0, 0.5, 0.9), metrics(1.0, 0.0, 0.1)] {
            let decision = evaluate_gate(m, &[], &GateThresholds::default(), 0);
            assert!(should_retry(&decision, 0, 2), "{:?}", decision.failure_reasons);
        }
    }

    #[test]
    fn passed_decision_never_retries() {
        let decision = evaluate_gate(metrics(0.98, 0.02, 0.85), &[], &GateThresholds::default(), 0);
        assert!(!should_retry(&decision, 0, 2));
    }

    #[test]
    fn unknown_failure_categories_are_not_retried() {
        let mut decision = evaluate_gate(metrics(0.98, 0.02, 0.85), &[], &GateThresholds::default(), 0);
        decision.passed = false;
        decision.failure_reasons = vec!["Article too short".to_string()];
        assert!(!should_retry(&decision, 0, 2));
    }
}
