//! Run-time settings for the stage nodes and the executor.
//!
//! Loaded by the CLI as the `[pipeline]` table of the configuration file;
//! every field has a default so an empty table is valid.

use std::time::Duration;

use pipeline::{ChunkingConfig, GateThresholds, ModelName, PipelineError};
use serde::{Deserialize, Serialize};

use crate::gateway::ModelRouting;
use crate::rate_limiter::RateLimits;

/// Settings shared by every stage of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Model for planning, claim extraction, fact-checking and SEO.
    pub orchestration_model: String,
    /// Model for drafting, writing and editing.
    pub writer_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_calls_per_minute: u32,
    pub max_tokens_per_minute: u64,
    /// Wall-clock budget for a whole run.
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub thresholds: GateThresholds,
    /// Flesch reading ease the editor aims for.
    pub target_reading_level: f64,
    pub max_search_results: usize,
    pub max_sources: usize,
    pub retry_sources: usize,
    pub retry_search_results: usize,
    pub search_concurrency: usize,
    pub scrape_concurrency: usize,
    pub fact_check_concurrency: usize,
    /// Chunks retrieved per query.
    pub retrieval_k: usize,
    /// Verified claims handed to the writer.
    pub max_writer_claims: usize,
    /// Phrases that mark a sentence as common knowledge.
    pub common_knowledge_phrases: Vec<String>,
    pub chunking: ChunkingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            orchestration_model: "llama-3.1-8b-instant".to_string(),
            writer_model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
            max_calls_per_minute: 30,
            max_tokens_per_minute: 14_000,
            timeout_seconds: 600,
            max_retries: 2,
            thresholds: GateThresholds::default(),
            target_reading_level: 60.0,
            max_search_results: 30,
            max_sources: 12,
            retry_sources: 5,
            retry_search_results: 20,
            search_concurrency: 3,
            scrape_concurrency: 5,
            fact_check_concurrency: 5,
            retrieval_k: 5,
            max_writer_claims: 20,
            common_knowledge_phrases: Vec::new(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            max_calls_per_minute: self.max_calls_per_minute,
            max_tokens_per_minute: self.max_tokens_per_minute,
        }
    }

    /// Model selection for the gateway.
    pub fn model_routing(&self) -> Result<ModelRouting, PipelineError> {
        let model = |name: &str| {
            ModelName::new(name.trim()).ok_or_else(|| PipelineError::Configuration {
                message: "model names must not be empty".to_string(),
            })
        };
        Ok(ModelRouting {
            orchestration: model(&self.orchestration_model)?,
            writer: model(&self.writer_model)?,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        })
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |message: String| Err(PipelineError::Configuration { message });

        for (name, value) in [
            ("thresholds.min_citation_coverage", self.thresholds.min_citation_coverage),
            ("thresholds.max_unsupported_claim_rate", self.thresholds.max_unsupported_claim_rate),
            ("thresholds.min_fact_confidence", self.thresholds.min_fact_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return fail(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return fail(format!("temperature must be within [0, 2], got {}", self.temperature));
        }
        if self.max_calls_per_minute == 0 || self.max_tokens_per_minute == 0 {
            return fail("rate limits must be greater than zero".to_string());
        }
        if self.timeout_seconds == 0 {
            return fail("timeout_seconds must be greater than zero".to_string());
        }
        if self.orchestration_model.trim().is_empty() || self.writer_model.trim().is_empty() {
            return fail("model names must not be empty".to_string());
        }
        if self.max_sources == 0 || self.max_search_results == 0 {
            return fail("max_sources and max_search_results must be greater than zero".to_string());
        }
        if self.search_concurrency == 0 || self.scrape_concurrency == 0 || self.fact_check_concurrency == 0 {
            return fail("concurrency limits must be greater than zero".to_string());
        }
        if self.chunking.chunk_size == 0 || self.chunking.overlap >= self.chunking.chunk_size {
            return fail("chunking.overlap must be smaller than a non-zero chunking.chunk_size".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = PipelineConfig::default();
        config.thresholds.min_citation_coverage = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_citation_coverage"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = PipelineConfig {
            timeout_seconds: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_table_keeps_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"max_retries": 4}"#).unwrap();
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.max_sources, 12);
    }
}
