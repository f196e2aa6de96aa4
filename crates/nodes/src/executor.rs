//! The blackboard executor.
//!
//! One run is a loop over the fixed stage graph: look up the node for the
//! current stage, run it against the current [`RunState`], fold the returned
//! [`StageDelta`] into the state, and ask [`Stage::next`] where to go. The loop
//! ends after Finalize, on the first stage error, or when the run deadline
//! passes. Every outcome is a `RunState`; the executor never panics or returns
//! an error for a failed run.

use std::collections::HashMap;
use std::sync::Arc;

use pipeline::{PipelineError, RunState, Stage, StageDelta, TopicSpec};
use tokio::time::{timeout_at, Instant};
use tracing::{instrument, Instrument};

use crate::context::RunContext;
use crate::stages::{default_nodes, Node};

/// Drives runs through the stage graph.
pub struct PipelineExecutor {
    nodes: HashMap<Stage, Arc<dyn Node>>,
}

impl PipelineExecutor {
    /// Builds an executor from one node per stage.
    ///
    /// Later nodes replace earlier ones registered for the same stage. Fails
    /// with [`PipelineError::Configuration`] when a stage has no node.
    pub fn new(nodes: Vec<Arc<dyn Node>>) -> Result<Self, PipelineError> {
        let nodes = nodes
            .into_iter()
            .map(|node| (node.stage(), node))
            .collect::<HashMap<_, _>>();
        let missing = Stage::ALL
            .iter()
            .filter(|stage| !nodes.contains_key(stage))
            .map(|stage| stage.as_str())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(PipelineError::Configuration {
                message: format!("no node registered for stage(s): {}", missing.join(", ")),
            });
        }
        Ok(Self { nodes })
    }

    /// An executor running the production nodes.
    pub fn with_default_nodes() -> Self {
        Self {
            nodes: default_nodes().into_iter().map(|node| (node.stage(), node)).collect(),
        }
    }

    /// Runs `topic` to completion, failure, or timeout.
    ///
    /// The timeout covers the whole run; a stage still in flight when it
    /// expires is cancelled.
    #[instrument(skip_all, fields(run_id = %ctx.run_id, topic = %topic.topic))]
    pub async fn run(&self, topic: TopicSpec, ctx: &RunContext) -> RunState {
        let deadline = Instant::now() + ctx.config.timeout();
        let max_retries = ctx.config.max_retries;
        let mut state = RunState::new(ctx.run_id, topic);
        tracing::info!(max_retries, timeout_seconds = ctx.config.timeout_seconds, "run started");

        let mut next = Some(Stage::Plan);
        while let Some(stage) = next {
            state = match self.step(stage, &state, ctx, deadline).await {
                Ok(delta) => state.apply(delta),
                Err(error) => {
                    tracing::error!(stage = %stage, error = %error, "run failed");
                    return state.fail(stage, &error);
                }
            };
            next = stage.next(&state, max_retries);
        }

        tracing::info!(
            status = %state.status,
            retries = state.retry_count,
            sources = state.sources.len(),
            "run finished"
        );
        state
    }

    async fn step(
        &self,
        stage: Stage,
        state: &RunState,
        ctx: &RunContext,
        deadline: Instant,
    ) -> Result<StageDelta, PipelineError> {
        let timeout = || PipelineError::Timeout {
            seconds: ctx.config.timeout_seconds,
        };
        if Instant::now() >= deadline {
            return Err(timeout());
        }
        let node = self.nodes.get(&stage).ok_or_else(|| PipelineError::Configuration {
            message: format!("no node registered for stage {stage}"),
        })?;

        let span = tracing::info_span!("stage", stage = %stage, retry = state.retry_count);
        let started = Instant::now();
        match timeout_at(deadline, node.run(state, ctx).instrument(span)).await {
            Err(_) => Err(timeout()),
            Ok(Err(error)) => Err(PipelineError::StageFailed {
                stage,
                message: error.to_string(),
            }),
            Ok(Ok(delta)) if delta.stage() != stage => Err(PipelineError::StageFailed {
                stage,
                message: format!("node produced a {} result", delta.stage()),
            }),
            Ok(Ok(delta)) => {
                tracing::debug!(stage = %stage, elapsed_ms = started.elapsed().as_millis() as u64, "stage completed");
                Ok(delta)
            }
        }
    }
}
