//! Scrivener stage nodes, the LLM gateway and the blackboard executor.
//!
//! This crate provides one node per pipeline stage (Plan through Finalize),
//! the LLM gateway that routes, rate-limits and validates every model call,
//! and the [`PipelineExecutor`] that drives a run through the stage graph.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Nodes sequence calls between business logic in the
//! [`pipeline`] crate and the infrastructure ports (model provider, search,
//! scraping, retrieval). They contain no quality rules of their own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `PipelineConfig`: models, limits, thresholds, chunking |
//! | [`context`] | `Services` and the per-run `RunContext` |
//! | [`error`] | `StageError` |
//! | [`executor`] | `PipelineExecutor` |
//! | [`gateway`] | `LlmGateway`, task routing, JSON validate-then-retry |
//! | [`prompts`] | System prompts and prompt builders |
//! | [`rate_limiter`] | Sliding-window call and token limiter |
//! | [`sourcing`] | Multi-query search, bounded scraping, ranking |
//! | [`stages`] | The `Node` trait and the eleven stage nodes |
//! | [`usage`] | Call and token counters |

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod prompts;
pub mod rate_limiter;
pub mod sourcing;
pub mod stages;
pub mod usage;

pub use config::PipelineConfig;
pub use context::{RunContext, Services};
pub use error::StageError;
pub use executor::PipelineExecutor;
pub use gateway::{LlmGateway, ModelRouting, Task, JSON_ATTEMPTS};
pub use rate_limiter::{RateLimiter, RateLimits};
pub use stages::{default_nodes, Node};
pub use usage::UsageCounter;
