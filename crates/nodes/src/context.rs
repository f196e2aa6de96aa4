//! Per-run context handed to every stage node.
//!
//! [`Services`] holds the collaborators shared by all runs in the process (the
//! gateway with its rate limiter, search backends, the scraper, the vector
//! store). [`RunContext`] pairs them with what belongs to one run only: its id,
//! its configuration and its usage counter.

use std::sync::Arc;

use pipeline::{MetadataFilter, RunId, Scraper, SearchBackend, VectorStore};

use crate::config::PipelineConfig;
use crate::gateway::LlmGateway;
use crate::usage::UsageCounter;

/// Process-wide collaborators.
#[derive(Clone)]
pub struct Services {
    pub gateway: Arc<LlmGateway>,
    /// Search backends in priority order.
    pub search: Vec<Arc<dyn SearchBackend>>,
    pub scraper: Arc<dyn Scraper>,
    pub store: Arc<dyn VectorStore>,
}

/// Everything a stage may use besides the run state.
pub struct RunContext {
    pub run_id: RunId,
    pub config: Arc<PipelineConfig>,
    pub services: Services,
    pub usage: UsageCounter,
}

impl RunContext {
    pub fn new(run_id: RunId, config: Arc<PipelineConfig>, services: Services) -> Self {
        Self {
            run_id,
            config,
            services,
            usage: UsageCounter::new(),
        }
    }

    pub fn gateway(&self) -> &LlmGateway {
        &self.services.gateway
    }

    /// Restricts vector-store queries to this run's chunks.
    pub fn run_filter(&self) -> MetadataFilter {
        MetadataFilter::for_run(self.run_id)
    }
}
