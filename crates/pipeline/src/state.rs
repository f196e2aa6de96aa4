//! The run blackboard: [`RunState`], the per-stage [`StageDelta`] products,
//! and the reducer that merges one into the other.
//!
//! ## Ownership
//!
//! Only the executor holds a `RunState` by value. Stages receive a shared
//! reference and return a [`StageDelta`]; [`RunState::apply`] is the single
//! place where state changes.
//!
//! ## Merge rules
//!
//! | Field | Rule |
//! |-------|------|
//! | `logs`, `sources`, `gate_history` | appended |
//! | `drafts`, `verdicts` | replaced by each pass (whole-pass products) |
//! | `outline`, `article`, `seo`, `quality`, `gate`, `source_pack` | replaced |
//! | `retry_count` | incremented by the Retry stage only |
//! | `should_retry` | set by Judge, cleared by Retry |

use serde::{Deserialize, Serialize};

use crate::{
    Article, DraftSection, GateDecision, Outline, PipelineError, QualityMetrics, RunId, RunMetrics,
    SeoMetadata, Source, Timestamp, TopicSpec, Verdict,
};

// ---------------------------------------------------------------------------
// Stage graph
// ---------------------------------------------------------------------------

/// One node of the fixed stage graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Source,
    Index,
    Summarize,
    FactCheck,
    Write,
    Edit,
    Seo,
    Judge,
    Retry,
    Finalize,
}

impl Stage {
    /// Every stage in first-pass order.
    pub const ALL: [Stage; 11] = [
        Stage::Plan,
        Stage::Source,
        Stage::Index,
        Stage::Summarize,
        Stage::FactCheck,
        Stage::Write,
        Stage::Edit,
        Stage::Seo,
        Stage::Judge,
        Stage::Retry,
        Stage::Finalize,
    ];

    /// Stable lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Source => "source",
            Self::Index => "index",
            Self::Summarize => "summarize",
            Self::FactCheck => "fact_check",
            Self::Write => "write",
            Self::Edit => "edit",
            Self::Seo => "seo",
            Self::Judge => "judge",
            Self::Retry => "retry",
            Self::Finalize => "finalize",
        }
    }

    /// The stage that follows `self` given the current state, or `None` after
    /// [`Stage::Finalize`].
    ///
    /// Judge routes to Retry only while `state.should_retry` is set and
    /// `state.retry_count < max_retries`; the bound is enforced here no matter
    /// what the Judge stage reported. Retry loops back to Index.
    pub fn next(self, state: &RunState, max_retries: u32) -> Option<Stage> {
        Some(match self {
            Self::Plan => Self::Source,
            Self::Source => Self::Index,
            Self::Index => Self::Summarize,
            Self::Summarize => Self::FactCheck,
            Self::FactCheck => Self::Write,
            Self::Write => Self::Edit,
            Self::Edit => Self::Seo,
            Self::Seo => Self::Judge,
            Self::Judge if state.should_retry && state.retry_count < max_retries => Self::Retry,
            Self::Judge => Self::Finalize,
            Self::Retry => Self::Index,
            Self::Finalize => return None,
        })
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Stages are still executing.
    Running,
    /// Finalised with a passing gate.
    Completed,
    /// Finalised after the retry budget ran out with a failing gate.
    CompletedWithWarnings,
    /// Aborted by a stage failure or the run timeout.
    Failed,
}

impl RunStatus {
    /// `true` for every status other than [`RunStatus::Running`].
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Stable lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithWarnings => "completed_with_warnings",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Blackboard
// ---------------------------------------------------------------------------

/// A timestamped note attributed to a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub stage: Stage,
    pub message: String,
}

/// Bookkeeping about how the current source list was selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePack {
    /// Human-readable account of the selection.
    pub selection_rationale: String,
    /// Number of pages fetched before de-duplication and ranking.
    pub total_candidates: usize,
    /// Unique domains divided by selected sources.
    pub diversity_score: f64,
}

/// The progressively enriched record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub topic: TopicSpec,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub outline: Option<Outline>,
    pub sources: Vec<Source>,
    pub source_pack: Option<SourcePack>,
    pub chunks_indexed: usize,
    pub drafts: Vec<DraftSection>,
    pub verdicts: Vec<Verdict>,
    pub article: Option<Article>,
    pub seo: Option<SeoMetadata>,
    pub quality: Option<QualityMetrics>,
    pub gate: Option<GateDecision>,
    pub gate_history: Vec<GateDecision>,
    pub retry_count: u32,
    pub should_retry: bool,
    pub logs: Vec<LogEntry>,
    pub status: RunStatus,
    pub error: Option<String>,
    pub run_metrics: Option<RunMetrics>,
}

/// The product of one stage execution.
#[derive(Debug, Clone, PartialEq)]
pub enum StageDelta {
    Planned {
        outline: Outline,
    },
    Sourced {
        sources: Vec<Source>,
        pack: SourcePack,
    },
    Indexed {
        chunks: usize,
    },
    Summarized {
        drafts: Vec<DraftSection>,
    },
    FactChecked {
        verdicts: Vec<Verdict>,
    },
    Written {
        article: Article,
    },
    Edited {
        article: Article,
    },
    Optimized {
        seo: SeoMetadata,
    },
    Judged {
        metrics: QualityMetrics,
        decision: GateDecision,
        should_retry: bool,
        /// Advisory citation issues, recorded in the log.
        notes: Vec<String>,
    },
    Retried {
        sources: Vec<Source>,
    },
    Finalized {
        metrics: RunMetrics,
    },
}

impl StageDelta {
    /// The stage that produces this kind of delta.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Planned { .. } => Stage::Plan,
            Self::Sourced { .. } => Stage::Source,
            Self::Indexed { .. } => Stage::Index,
            Self::Summarized { .. } => Stage::Summarize,
            Self::FactChecked { .. } => Stage::FactCheck,
            Self::Written { .. } => Stage::Write,
            Self::Edited { .. } => Stage::Edit,
            Self::Optimized { .. } => Stage::Seo,
            Self::Judged { .. } => Stage::Judge,
            Self::Retried { .. } => Stage::Retry,
            Self::Finalized { .. } => Stage::Finalize,
        }
    }

    /// One-line description recorded in the run log.
    pub fn summary(&self) -> String {
        match self {
            Self::Planned { outline } => {
                format!("planned '{}' with {} sections", outline.title, outline.sections.len())
            }
            Self::Sourced { sources, pack } => format!(
                "selected {} sources from {} candidates",
                sources.len(),
                pack.total_candidates
            ),
            Self::Indexed { chunks } => format!("indexed {chunks} chunks"),
            Self::Summarized { drafts } => format!("drafted {} sections", drafts.len()),
            Self::FactChecked { verdicts } => format!("checked {} claims", verdicts.len()),
            Self::Written { article } => format!("wrote {} words", article.word_count),
            Self::Edited { article } => format!(
                "edited to {} words, reading level {:.1}",
                article.word_count, article.reading_level
            ),
            Self::Optimized { seo } => format!("generated SEO metadata for '{}'", seo.slug),
            Self::Judged { decision, .. } if decision.passed => "quality gate passed".to_string(),
            Self::Judged { decision, .. } => {
                format!("quality gate failed: {}", decision.failure_reasons.join("; "))
            }
            Self::Retried { sources } => format!("added {} sources", sources.len()),
            Self::Finalized { metrics } => format!(
                "finalized after {:.1}s, {} tokens over {} calls",
                metrics.elapsed_seconds, metrics.total_tokens, metrics.total_calls
            ),
        }
    }
}

impl RunState {
    /// Creates the initial state of a run.
    pub fn new(run_id: RunId, topic: TopicSpec) -> Self {
        Self {
            run_id,
            topic,
            started_at: Timestamp::now(),
            completed_at: None,
            outline: None,
            sources: Vec::new(),
            source_pack: None,
            chunks_indexed: 0,
            drafts: Vec::new(),
            verdicts: Vec::new(),
            article: None,
            seo: None,
            quality: None,
            gate: None,
            gate_history: Vec::new(),
            retry_count: 0,
            should_retry: false,
            logs: Vec::new(),
            status: RunStatus::Running,
            error: None,
            run_metrics: None,
        }
    }

    /// Appends a log entry.
    pub fn log(&mut self, stage: Stage, message: impl Into<String>) {
        self.logs.push(LogEntry {
            timestamp: Timestamp::now(),
            stage,
            message: message.into(),
        });
    }

    /// Merges one stage product into the state.
    #[must_use]
    pub fn apply(mut self, delta: StageDelta) -> Self {
        let stage = delta.stage();
        let summary = delta.summary();
        match delta {
            StageDelta::Planned { outline } => self.outline = Some(outline),
            StageDelta::Sourced { sources, pack } => {
                self.sources.extend(sources);
                self.source_pack = Some(pack);
            }
            StageDelta::Indexed { chunks } => self.chunks_indexed = chunks,
            StageDelta::Summarized { drafts } => self.drafts = drafts,
            StageDelta::FactChecked { verdicts } => self.verdicts = verdicts,
            StageDelta::Written { article } | StageDelta::Edited { article } => {
                self.article = Some(article);
            }
            StageDelta::Optimized { seo } => self.seo = Some(seo),
            StageDelta::Judged { metrics, decision, should_retry, notes } => {
                self.quality = Some(metrics);
                self.gate_history.push(decision.clone());
                self.gate = Some(decision);
                self.should_retry = should_retry;
                for note in notes {
                    self.log(stage, note);
                }
            }
            StageDelta::Retried { sources } => {
                self.sources.extend(sources);
                self.retry_count += 1;
                self.should_retry = false;
            }
            StageDelta::Finalized { metrics } => {
                self.run_metrics = Some(metrics);
                self.status = self.terminal_status();
                self.completed_at = Some(Timestamp::now());
            }
        }
        self.log(stage, summary);
        self
    }

    /// Marks the run failed, keeping everything accumulated so far.
    #[must_use]
    pub fn fail(mut self, stage: Stage, error: &PipelineError) -> Self {
        let message = error.to_string();
        self.log(stage, message.clone());
        self.status = RunStatus::Failed;
        self.error = Some(message);
        self.completed_at = Some(Timestamp::now());
        self
    }

    /// The status a finalised run ends with: completed iff the latest gate
    /// decision passed.
    pub fn terminal_status(&self) -> RunStatus {
        match &self.gate {
            Some(decision) if decision.passed => RunStatus::Completed,
            _ => RunStatus::CompletedWithWarnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{evaluate_gate, GateThresholds, ScrapedPage};

    fn state() -> RunState {
        RunState::new(RunId::new_random(), TopicSpec::new("Rust", "devs").unwrap())
    }

    fn source(url: &str) -> Source {
        Source::from_page(
            ScrapedPage {
                final_url: url.to_string(),
                raw_text: url.to_string(),
                title: None,
                author: None,
                published_date: None,
            },
            Timestamp::now(),
        )
        .unwrap()
    }

    fn judged(passed: bool, should_retry: bool) -> StageDelta {
        let coverage = if passed { 1.0 } else { 0.5 };
        let metrics = QualityMetrics {
            citation_coverage: coverage,
            unsupported_claim_rate: 0.0,
            avg_fact_confidence: 0.9,
            reading_level: 60.0,
            total_claims: 1,
            total_sources: 1,
            total_citations: 1,
        };
        StageDelta::Judged {
            metrics,
            decision: evaluate_gate(metrics, &[], &GateThresholds::default(), 0),
            should_retry,
            notes: vec!["1 sentences lack citations".into()],
        }
    }

    #[test]
    fn new_state_is_running() {
        let state = state();
        assert_eq!(state.status, RunStatus::Running);
        assert!(state.completed_at.is_none());
    }

    #[test]
    fn sources_append_and_retry_increments() {
        let pack = SourcePack {
            selection_rationale: String::new(),
            total_candidates: 1,
            diversity_score: 1.0,
        };
        let state = state()
            .apply(StageDelta::Sourced { sources: vec![source("https://a.com/1")], pack })
            .apply(judged(false, true))
            .apply(StageDelta::Retried { sources: vec![source("https://b.com/2")] });
        assert_eq!(state.sources.len(), 2);
        assert_eq!(state.retry_count, 1);
        assert!(!state.should_retry);
        assert_eq!(state.logs.len(), 4);
    }

    #[test]
    fn gate_history_appends_while_gate_is_replaced() {
        let state = state().apply(judged(false, true)).apply(judged(true, false));
        assert_eq!(state.gate_history.len(), 2);
        assert!(state.gate.as_ref().unwrap().passed);
    }

    #[test]
    fn verdicts_are_replaced_per_pass() {
        let state = state()
            .apply(StageDelta::FactChecked { verdicts: vec![] })
            .apply(StageDelta::Summarized { drafts: vec![DraftSection::new("s", "x", vec![])] })
            .apply(StageDelta::Summarized { drafts: vec![] });
        assert!(state.drafts.is_empty());
    }

    #[test]
    fn judge_routes_to_retry_only_within_bound() {
        let mut state = state().apply(judged(false, true));
        assert_eq!(Stage::Judge.next(&state, 2), Some(Stage::Retry));
        state.retry_count = 2;
        assert_eq!(Stage::Judge.next(&state, 2), Some(Stage::Finalize));
        assert_eq!(Stage::Retry.next(&state, 2), Some(Stage::Index));
        assert_eq!(Stage::Finalize.next(&state, 2), None);
    }

    #[test]
    fn finalize_reflects_last_gate() {
        let metrics = RunMetrics::default();
        let passed = state().apply(judged(true, false)).apply(StageDelta::Finalized { metrics });
        assert_eq!(passed.status, RunStatus::Completed);
        assert!(passed.completed_at.is_some());

        let failed = state().apply(judged(false, true)).apply(StageDelta::Finalized { metrics });
        assert_eq!(failed.status, RunStatus::CompletedWithWarnings);
    }

    #[test]
    fn failure_preserves_state() {
        let state = state()
            .apply(StageDelta::Indexed { chunks: 7 })
            .fail(Stage::Write, &PipelineError::Timeout { seconds: 600 });
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.chunks_indexed, 7);
        assert_eq!(state.error.as_deref(), Some("pipeline exceeded timeout of 600 seconds"));
    }
}
