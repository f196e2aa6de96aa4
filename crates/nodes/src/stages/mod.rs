//! The stage nodes of the fixed pipeline graph.
//!
//! | Stage | Node | Module |
//! |-------|------|--------|
//! | Plan, Source, Index, Retry | [`PlanNode`], [`SourceNode`], [`IndexNode`], [`RetryNode`] | [`research`] |
//! | Summarize, FactCheck, Write, Edit | [`SummarizeNode`], [`FactCheckNode`], [`WriteNode`], [`EditNode`] | [`drafting`] |
//! | Seo, Judge, Finalize | [`SeoNode`], [`JudgeNode`], [`FinalizeNode`] | [`review`] |
//!
//! A node reads the run state and returns a [`StageDelta`]; it never mutates
//! state itself.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{RunState, Stage, StageDelta};

use crate::context::RunContext;
use crate::StageError;

pub mod drafting;
pub mod research;
pub mod review;

pub use drafting::{EditNode, FactCheckNode, SummarizeNode, WriteNode};
pub use research::{IndexNode, PlanNode, RetryNode, SourceNode};
pub use review::{FinalizeNode, JudgeNode, SeoNode};

/// One stage of the pipeline.
#[async_trait]
pub trait Node: Send + Sync {
    /// The stage this node implements.
    fn stage(&self) -> Stage;

    /// Produces this stage's contribution to the run.
    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError>;
}

/// One production node per stage.
pub fn default_nodes() -> Vec<Arc<dyn Node>> {
    vec![
        Arc::new(PlanNode),
        Arc::new(SourceNode),
        Arc::new(IndexNode),
        Arc::new(SummarizeNode),
        Arc::new(FactCheckNode),
        Arc::new(WriteNode),
        Arc::new(EditNode),
        Arc::new(SeoNode),
        Arc::new(JudgeNode),
        Arc::new(RetryNode),
        Arc::new(FinalizeNode),
    ]
}

fn require<'a, T>(value: Option<&'a T>, what: &'static str) -> Result<&'a T, StageError> {
    value.ok_or(StageError::MissingInput { what })
}
