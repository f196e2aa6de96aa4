//! Evaluation and wrap-up: Seo, Judge and Finalize.

use async_trait::async_trait;
use pipeline::schema::SeoResponse;
use pipeline::{
    article_json_ld, compute_quality_metrics, evaluate_gate, extract_h2_headings, should_retry, slugify,
    validate_citations, ChatMessage, RunMetrics, RunState, SeoMetadata, Stage, StageDelta, Timestamp,
};

use super::{require, Node};
use crate::context::RunContext;
use crate::gateway::Task;
use crate::prompts;
use crate::StageError;

/// Produces search-engine metadata for the article.
pub struct SeoNode;

#[async_trait]
impl Node for SeoNode {
    fn stage(&self) -> Stage {
        Stage::Seo
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let article = require(state.article.as_ref(), "article")?;
        let h2_headings = extract_h2_headings(&article.body);
        let response: SeoResponse = ctx
            .gateway()
            .ask_json(
                Task::Seo,
                vec![
                    ChatMessage::system(prompts::seo_system()),
                    ChatMessage::user(prompts::seo(
                        &article.title,
                        &article.body,
                        &h2_headings,
                        article.word_count,
                    )),
                ],
                &ctx.usage,
            )
            .await?;

        let slug = match slugify(&response.slug) {
            slug if slug.is_empty() => slugify(&article.title),
            slug => slug,
        };
        let json_ld = article_json_ld(
            &response.title,
            &response.meta_description,
            &response.keywords,
            &Timestamp::now().to_string(),
            article.word_count,
        );
        tracing::info!(slug = %slug, keywords = response.keywords.len(), "seo metadata generated");

        Ok(StageDelta::Optimized {
            seo: SeoMetadata {
                title: response.title,
                slug,
                meta_description: response.meta_description,
                keywords: response.keywords,
                h1: response.h1,
                h2_headings,
                internal_links: response.internal_links,
                json_ld,
            },
        })
    }
}

/// Scores the article and applies the quality gate.
///
/// Citation-validator issues are attached as notes for the run log; they do
/// not affect the decision.
pub struct JudgeNode;

#[async_trait]
impl Node for JudgeNode {
    fn stage(&self) -> Stage {
        Stage::Judge
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let article = require(state.article.as_ref(), "article")?;
        let config = &ctx.config;

        let metrics = compute_quality_metrics(&article.citations, &state.verdicts, &article.body, state.sources.len());
        let decision = evaluate_gate(metrics, &state.verdicts, &config.thresholds, state.retry_count);
        let retry = should_retry(&decision, state.retry_count, config.max_retries);
        let notes = validate_citations(&article.citations)
            .into_iter()
            .map(|issue| format!("citation check: {issue}"))
            .collect::<Vec<_>>();

        if decision.passed {
            tracing::info!(coverage = metrics.citation_coverage, "quality gate passed");
        } else {
            tracing::warn!(
                reasons = ?decision.failure_reasons,
                retry_count = state.retry_count,
                will_retry = retry,
                "quality gate failed"
            );
        }

        Ok(StageDelta::Judged {
            metrics,
            decision,
            should_retry: retry,
            notes,
        })
    }
}

/// Records elapsed time and model usage for the run.
pub struct FinalizeNode;

#[async_trait]
impl Node for FinalizeNode {
    fn stage(&self) -> Stage {
        Stage::Finalize
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let metrics = RunMetrics {
            elapsed_seconds: Timestamp::now().seconds_since(state.started_at),
            total_tokens: ctx.usage.tokens(),
            total_calls: ctx.usage.calls(),
        };
        tracing::info!(
            elapsed_seconds = metrics.elapsed_seconds,
            tokens = metrics.total_tokens.as_u64(),
            calls = metrics.total_calls,
            "run finalized"
        );
        Ok(StageDelta::Finalized { metrics })
    }
}
