//! Executor control flow with scripted nodes.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nodes::{Node, PipelineConfig, PipelineExecutor, RunContext, StageError};
use pipeline::{
    build_citation_map, evaluate_gate, Article, GateThresholds, Outline, OutlineSection, PipelineError,
    QualityMetrics, RunMetrics, RunState, RunStatus, SeoMetadata, SourcePack, Stage, StageDelta, TopicSpec,
};
use support::{config, context, FailingProvider};

type Script = Box<dyn Fn(&RunState) -> Result<StageDelta, StageError> + Send + Sync>;

struct Scripted {
    stage: Stage,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    script: Script,
}

#[async_trait]
impl Node for Scripted {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn run(&self, state: &RunState, _ctx: &RunContext) -> Result<StageDelta, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(state)
    }
}

fn metrics(coverage: f64) -> QualityMetrics {
    QualityMetrics {
        citation_coverage: coverage,
        unsupported_claim_rate: 0.0,
        avg_fact_confidence: 0.9,
        reading_level: 60.0,
        total_claims: 0,
        total_sources: 0,
        total_citations: 1,
    }
}

/// The successful product of each stage. Judge passes when `gate_passes`.
fn happy_delta(stage: Stage, state: &RunState, gate_passes: bool) -> StageDelta {
    match stage {
        Stage::Plan => StageDelta::Planned {
            outline: Outline {
                title: "Scripted".into(),
                sections: vec![OutlineSection {
                    title: "Only".into(),
                    key_questions: vec![],
                    expected_claims: vec![],
                    estimated_words: 100,
                }],
                target_keywords: vec![],
                estimated_total_words: 100,
                rationale: String::new(),
            },
        },
        Stage::Source => StageDelta::Sourced {
            sources: vec![],
            pack: SourcePack {
                selection_rationale: String::new(),
                total_candidates: 0,
                diversity_score: 0.0,
            },
        },
        Stage::Index => StageDelta::Indexed { chunks: 3 },
        Stage::Summarize => StageDelta::Summarized { drafts: vec![] },
        Stage::FactCheck => StageDelta::FactChecked { verdicts: vec![] },
        Stage::Write | Stage::Edit => {
            let body = "Scripted body [1].";
            let article = Article::new("Scripted", body, build_citation_map(body, &[], &[]));
            if stage == Stage::Write {
                StageDelta::Written { article }
            } else {
                StageDelta::Edited { article }
            }
        }
        Stage::Seo => StageDelta::Optimized {
            seo: SeoMetadata {
                title: "Scripted".into(),
                slug: "scripted".into(),
                meta_description: String::new(),
                keywords: vec![],
                h1: "Scripted".into(),
                h2_headings: vec![],
                internal_links: vec![],
                json_ld: serde_json::Value::Null,
            },
        },
        Stage::Judge => {
            let metrics = metrics(if gate_passes { 1.0 } else { 0.5 });
            let decision = evaluate_gate(metrics, &[], &GateThresholds::default(), state.retry_count);
            StageDelta::Judged {
                metrics,
                // Always asks for another pass; the executor enforces the bound.
                should_retry: !decision.passed,
                decision,
                notes: vec![],
            }
        }
        Stage::Retry => StageDelta::Retried { sources: vec![] },
        Stage::Finalize => StageDelta::Finalized {
            metrics: RunMetrics::default(),
        },
    }
}

struct Harness {
    nodes: Vec<Arc<dyn Node>>,
    calls: Vec<(Stage, Arc<AtomicUsize>)>,
}

impl Harness {
    fn new(gate_passes: bool) -> Self {
        let mut harness = Self {
            nodes: vec![],
            calls: vec![],
        };
        for stage in Stage::ALL {
            harness.set(stage, Duration::ZERO, move |state| Ok(happy_delta(stage, state, gate_passes)));
        }
        harness
    }

    fn set(
        &mut self,
        stage: Stage,
        delay: Duration,
        script: impl Fn(&RunState) -> Result<StageDelta, StageError> + Send + Sync + 'static,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        self.calls.retain(|(s, _)| *s != stage);
        self.calls.push((stage, Arc::clone(&calls)));
        self.nodes.push(Arc::new(Scripted {
            stage,
            delay,
            calls,
            script: Box::new(script),
        }));
    }

    fn calls(&self, stage: Stage) -> usize {
        self.calls
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, c)| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn executor(&self) -> PipelineExecutor {
        PipelineExecutor::new(self.nodes.clone()).unwrap()
    }
}

fn topic() -> TopicSpec {
    TopicSpec::new("scripted topic", "").unwrap()
}

fn ctx_with(config: PipelineConfig) -> RunContext {
    context(Arc::new(FailingProvider), config)
}

#[tokio::test]
async fn passing_gate_runs_every_first_pass_stage_once() {
    let harness = Harness::new(true);
    let state = harness.executor().run(topic(), &ctx_with(config())).await;

    assert_eq!(state.status, RunStatus::Completed);
    assert_eq!(state.topic.audience, "general");
    for stage in Stage::ALL {
        let expected = usize::from(stage != Stage::Retry);
        assert_eq!(harness.calls(stage), expected, "{stage}");
    }
    assert_eq!(state.gate_history.len(), 1);
    assert!(state.completed_at.is_some());
}

#[tokio::test]
async fn failing_gate_retries_exactly_max_retries_times() {
    let harness = Harness::new(false);
    let ctx = ctx_with(PipelineConfig {
        max_retries: 2,
        ..config()
    });

    let state = harness.executor().run(topic(), &ctx).await;

    assert_eq!(harness.calls(Stage::Retry), 2);
    assert_eq!(harness.calls(Stage::Index), 3);
    assert_eq!(harness.calls(Stage::Judge), 3);
    assert_eq!(harness.calls(Stage::Finalize), 1);
    assert_eq!(state.retry_count, 2);
    assert_eq!(state.gate_history.len(), 3);
    assert_eq!(
        state.gate_history.iter().map(|g| g.retry_count).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(state.status, RunStatus::CompletedWithWarnings);
}

#[tokio::test]
async fn zero_max_retries_finalizes_after_first_failed_gate() {
    let harness = Harness::new(false);
    let ctx = ctx_with(PipelineConfig {
        max_retries: 0,
        ..config()
    });

    let state = harness.executor().run(topic(), &ctx).await;

    assert_eq!(harness.calls(Stage::Retry), 0);
    assert_eq!(state.status, RunStatus::CompletedWithWarnings);
}

#[tokio::test]
async fn stage_error_stops_the_run_and_keeps_prior_state() {
    let mut harness = Harness::new(true);
    harness.set(Stage::Write, Duration::ZERO, |_| Err(StageError::NoSources));

    let state = harness.executor().run(topic(), &ctx_with(config())).await;

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.error.as_deref(), Some("stage 'write' failed: no usable sources were found"));
    assert!(state.outline.is_some());
    assert_eq!(state.chunks_indexed, 3);
    assert!(state.article.is_none());
    assert_eq!(harness.calls(Stage::Edit), 0);
    assert_eq!(harness.calls(Stage::Finalize), 0);
    let last = state.logs.last().unwrap();
    assert_eq!(last.stage, Stage::Write);
}

#[tokio::test]
async fn mismatched_delta_fails_the_stage() {
    let mut harness = Harness::new(true);
    harness.set(Stage::Plan, Duration::ZERO, |_| Ok(StageDelta::Indexed { chunks: 1 }));

    let state = harness.executor().run(topic(), &ctx_with(config())).await;

    assert_eq!(state.status, RunStatus::Failed);
    assert!(state.error.unwrap().starts_with("stage 'plan' failed:"));
    assert_eq!(state.chunks_indexed, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_stage_times_out_the_run() {
    let mut harness = Harness::new(true);
    harness.set(Stage::Summarize, Duration::from_secs(30), |_| {
        Ok(StageDelta::Summarized { drafts: vec![] })
    });
    let ctx = ctx_with(PipelineConfig {
        timeout_seconds: 5,
        ..config()
    });

    let state = harness.executor().run(topic(), &ctx).await;

    assert_eq!(state.status, RunStatus::Failed);
    assert_eq!(state.error.as_deref(), Some("pipeline exceeded timeout of 5 seconds"));
    assert!(state.outline.is_some());
    assert_eq!(harness.calls(Stage::FactCheck), 0);
}

#[test]
fn missing_stage_is_a_configuration_error() {
    let harness = Harness::new(true);
    let nodes = harness
        .nodes
        .iter()
        .filter(|n| n.stage() != Stage::Seo)
        .cloned()
        .collect::<Vec<_>>();

    let Err(error) = PipelineExecutor::new(nodes) else {
        panic!("executor built without a Seo node");
    };
    assert!(matches!(error, PipelineError::Configuration { .. }));
    assert!(error.to_string().contains("seo"));
}
