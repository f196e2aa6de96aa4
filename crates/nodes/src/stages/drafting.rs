//! Content production: Summarize, FactCheck, Write and Edit.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use pipeline::schema::{ClaimListResponse, VerdictResponse};
use pipeline::{
    build_citation_map, Article, ChatMessage, Claim, DraftSection, EvidencePointer, RetrievedChunk,
    RunState, Stage, StageDelta, Verdict,
};

use super::{require, Node};
use crate::context::RunContext;
use crate::gateway::Task;
use crate::prompts;
use crate::StageError;

/// Drafts every outline section from retrieved chunks and extracts its claims.
pub struct SummarizeNode;

#[async_trait]
impl Node for SummarizeNode {
    fn stage(&self) -> Stage {
        Stage::Summarize
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let outline = require(state.outline.as_ref(), "outline")?;
        let gateway = ctx.gateway();
        let filter = ctx.run_filter();

        let mut drafts = Vec::with_capacity(outline.sections.len());
        for section in &outline.sections {
            let context = ctx
                .services
                .store
                .query(&prompts::section_query(section), ctx.config.retrieval_k, &filter)
                .await?;
            let content = gateway
                .ask_text(
                    Task::Draft,
                    vec![
                        ChatMessage::system(prompts::drafter_system()),
                        ChatMessage::user(prompts::draft_section(section, &state.sources, &context)),
                    ],
                    &ctx.usage,
                )
                .await?;
            let ClaimListResponse(claims) = gateway
                .ask_json(
                    Task::ExtractClaims,
                    vec![
                        ChatMessage::system(prompts::CLAIM_EXTRACTOR_SYSTEM),
                        ChatMessage::user(prompts::extract_claims(&content)),
                    ],
                    &ctx.usage,
                )
                .await?;
            let draft = DraftSection::new(section.title.clone(), content, claims);
            tracing::info!(
                section = %draft.section_title,
                words = draft.word_count,
                claims = draft.claims.len(),
                "section drafted"
            );
            drafts.push(draft);
        }
        Ok(StageDelta::Summarized { drafts })
    }
}

/// Checks every distinct claim against retrieved evidence, a bounded number
/// at a time. Verdicts keep the order the claims were drafted in.
pub struct FactCheckNode;

impl FactCheckNode {
    async fn check(claim: &Claim, ctx: &RunContext) -> Result<Verdict, StageError> {
        let evidence = ctx
            .services
            .store
            .query(&claim.text, ctx.config.retrieval_k, &ctx.run_filter())
            .await?;
        let response: VerdictResponse = ctx
            .gateway()
            .ask_json(
                Task::FactCheck,
                vec![
                    ChatMessage::system(prompts::fact_checker_system()),
                    ChatMessage::user(prompts::fact_check(&claim.text, &evidence)),
                ],
                &ctx.usage,
            )
            .await?;

        Ok(Verdict {
            claim_id: claim.claim_id.clone(),
            claim_text: claim.text.clone(),
            outcome: response.outcome,
            confidence: response.confidence,
            evidence: locate_quotes(&response, &evidence),
            reasoning: response.reasoning,
        })
    }
}

/// Keeps only quotes that actually occur in a retrieved chunk.
fn locate_quotes(response: &VerdictResponse, evidence: &[RetrievedChunk]) -> Vec<EvidencePointer> {
    response
        .evidence
        .iter()
        .filter(|q| !q.quote.trim().is_empty())
        .filter_map(|q| {
            let needle = q.quote.to_lowercase();
            evidence
                .iter()
                .find(|chunk| chunk.text.to_lowercase().contains(&needle))
                .map(|chunk| EvidencePointer {
                    source_id: chunk.source_id.clone(),
                    chunk_id: chunk.chunk_id.clone(),
                    quote: q.quote.clone(),
                    relevance: q.relevance,
                })
        })
        .collect()
}

#[async_trait]
impl Node for FactCheckNode {
    fn stage(&self) -> Stage {
        Stage::FactCheck
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let mut seen = HashSet::new();
        let claims = state
            .drafts
            .iter()
            .flat_map(|d| &d.claims)
            .filter(|c| seen.insert(c.claim_id.clone()))
            .cloned()
            .collect::<Vec<_>>();

        let results: Vec<Result<Verdict, StageError>> = stream::iter(claims)
            .map(|claim| async move { Self::check(&claim, ctx).await })
            .buffered(ctx.config.fact_check_concurrency.max(1))
            .collect()
            .await;
        let verdicts = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        let supported = verdicts.iter().filter(|v| v.outcome.is_usable()).count();
        tracing::info!(claims = verdicts.len(), usable = supported, "claims fact-checked");
        Ok(StageDelta::FactChecked { verdicts })
    }
}

/// Composes the article body from verified claims and drafts, then maps its
/// citations.
pub struct WriteNode;

#[async_trait]
impl Node for WriteNode {
    fn stage(&self) -> Stage {
        Stage::Write
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let outline = require(state.outline.as_ref(), "outline")?;
        let verified = state
            .verdicts
            .iter()
            .filter(|v| v.outcome.is_usable())
            .take(ctx.config.max_writer_claims)
            .collect::<Vec<_>>();

        let body = ctx
            .gateway()
            .ask_text(
                Task::Write,
                vec![
                    ChatMessage::system(prompts::writer_system()),
                    ChatMessage::user(prompts::write(outline, &state.drafts, &state.sources, &verified)),
                ],
                &ctx.usage,
            )
            .await?;
        let citations = build_citation_map(&body, &state.sources, &ctx.config.common_knowledge_phrases);
        let article = Article::new(outline.title.clone(), body, citations);
        tracing::info!(
            words = article.word_count,
            reading_level = article.reading_level,
            coverage = article.citations.coverage_rate,
            "article written"
        );
        Ok(StageDelta::Written { article })
    }
}

/// Edits the body for style and readability and rebuilds the citation map
/// from the edited text.
pub struct EditNode;

#[async_trait]
impl Node for EditNode {
    fn stage(&self) -> Stage {
        Stage::Edit
    }

    async fn run(&self, state: &RunState, ctx: &RunContext) -> Result<StageDelta, StageError> {
        let article = require(state.article.as_ref(), "article")?;
        let edited = ctx
            .gateway()
            .ask_text(
                Task::Edit,
                vec![
                    ChatMessage::system(prompts::editor_system()),
                    ChatMessage::user(prompts::edit(
                        &article.body,
                        &state.topic.audience,
                        ctx.config.target_reading_level,
                    )),
                ],
                &ctx.usage,
            )
            .await?;
        let citations = build_citation_map(&edited, &state.sources, &ctx.config.common_knowledge_phrases);
        let article = Article::new(article.title.clone(), edited, citations);
        tracing::info!(
            words = article.word_count,
            reading_level = article.reading_level,
            coverage = article.citations.coverage_rate,
            "article edited"
        );
        Ok(StageDelta::Edited { article })
    }
}
