//! Planning and source acquisition: Plan, Source, Index and Retry.

use async_trait::async_trait;
use pipeline::schema::OutlineResponse;
use pipeline::source::domain_diversity;
use pipeline::{chunk_source, ChatMessage, RunState, SourcePack, Stage, StageDelta};

use super::{require, Node};
use crate::context::RunContext;
use crate::gateway::Task;
use crate::prompts;
use crate::sourcing::{harvest_sources, HarvestLimits};
use crate::StageError;

/// Asks the planner model for an outline.
pub struct PlanNode;

#[async_trait]
impl Node for PlanNode {
    fn stage(&self) -> Stage {
        Stage::Plan
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let messages = vec![
            ChatMessage::system(prompts::planner_system()),
            ChatMessage::user(prompts::plan(&state.topic)),
        ];
        let OutlineResponse(outline) = ctx.gateway().ask_json(Task::Plan, messages, &ctx.usage).await?;
        tracing::info!(title = %outline.title, sections = outline.sections.len(), "outline planned");
        Ok(StageDelta::Planned { outline })
    }
}

/// Harvests, ranks and selects the initial source list.
pub struct SourceNode;

#[async_trait]
impl Node for SourceNode {
    fn stage(&self) -> Stage {
        Stage::Source
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let outline = require(state.outline.as_ref(), "outline")?;
        let config = &ctx.config;
        let limits = HarvestLimits {
            max_search_results: config.max_search_results,
            max_sources: config.max_sources,
            search_concurrency: config.search_concurrency,
            scrape_concurrency: config.scrape_concurrency,
        };
        let harvest = harvest_sources(
            outline,
            &ctx.services.search,
            &ctx.services.scraper,
            limits,
            &[],
        )
        .await;
        if harvest.sources.is_empty() {
            return Err(StageError::NoSources);
        }

        let diversity_score = domain_diversity(&harvest.sources);
        let top = harvest
            .sources
            .iter()
            .take(5)
            .map(|s| {
                format!(
                    "- {} ({}) relevance {:.2}, authority {:.2}",
                    s.title, s.domain, s.relevance_score, s.authority_score
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let pack = SourcePack {
            selection_rationale: format!(
                "Selected {} sources from {} candidates by relevance (60%) and domain authority (40%).\nTop sources:\n{top}",
                harvest.sources.len(),
                harvest.total_candidates
            ),
            total_candidates: harvest.total_candidates,
            diversity_score,
        };
        Ok(StageDelta::Sourced {
            sources: harvest.sources,
            pack,
        })
    }
}

/// Chunks every held source into the vector store, tagged with the run id.
pub struct IndexNode;

#[async_trait]
impl Node for IndexNode {
    fn stage(&self) -> Stage {
        Stage::Index
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let chunks = state
            .sources
            .iter()
            .flat_map(|source| chunk_source(source, ctx.run_id, &ctx.config.chunking))
            .collect::<Vec<_>>();
        let chunks = ctx.services.store.add(chunks).await?;
        tracing::info!(sources = state.sources.len(), chunks, "sources indexed");
        Ok(StageDelta::Indexed { chunks })
    }
}

/// Adds a few more sources after a failed gate. Already-held sources are
/// excluded; an empty harvest is not an error.
pub struct RetryNode;

#[async_trait]
impl Node for RetryNode {
    fn stage(&self) -> Stage {
        Stage::Retry
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let outline = require(state.outline.as_ref(), "outline")?;
        let config = &ctx.config;
        let limits = HarvestLimits {
            max_search_results: config.retry_search_results,
            max_sources: config.retry_sources,
            search_concurrency: config.search_concurrency,
            scrape_concurrency: config.scrape_concurrency,
        };
        let harvest = harvest_sources(
            outline,
            &ctx.services.search,
            &ctx.services.scraper,
            limits,
            &state.sources,
        )
        .await;
        tracing::info!(
            retry = state.retry_count + 1,
            added = harvest.sources.len(),
            "retry harvested additional sources"
        );
        Ok(StageDelta::Retried {
            sources: harvest.sources,
        })
    }
}
