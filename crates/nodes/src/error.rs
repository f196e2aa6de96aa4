//! Errors a stage node can fail with.
//!
//! Any `StageError` aborts the run: the executor converts it into
//! [`pipeline::PipelineError::StageFailed`] and marks the run failed. Dropped
//! items (a failed scrape, an empty search backend) are never reported here.

use pipeline::{LlmError, SchemaError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    /// The model provider failed after its own retries.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The model never produced output matching the expected schema.
    #[error("no valid {schema} response after {attempts} attempts: {last_error}")]
    InvalidResponse {
        schema: &'static str,
        attempts: u32,
        last_error: SchemaError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Source harvesting produced nothing the later stages could use.
    #[error("no usable sources were found")]
    NoSources,

    /// A stage ran before the stage that produces its input.
    #[error("missing {what}; the producing stage has not run")]
    MissingInput { what: &'static str },
}
