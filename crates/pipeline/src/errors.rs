//! Top-level error and retry-policy types for the Scrivener pipeline domain.
//!
//! [`PipelineError`] covers conditions that halt a run or prevent one from
//! starting. Component-level errors (e.g. [`crate::ports::LlmError`] failures,
//! schema validation failures) are defined in their respective modules.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].
//!
//! Quality-gate failures are deliberately absent from this module: a failed
//! gate is data ([`crate::gate::GateDecision::passed`] is `false`), handled by
//! the retry/finalize branch of the executor.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::Stage;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let the caller decide whether to
/// re-invoke an operation without escalating.
///
/// ## Rules
///
/// - `Retryable` errors: timeouts, rate-limit responses, 5xx responses.
/// - `NonRetryable` errors: 403/404/410 and other client errors, invalid
///   configuration, authentication failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried; escalation is required.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// Errors that halt a pipeline run or prevent one from starting.
///
/// The executor never returns these to its caller: a halted run is reported
/// through [`crate::state::RunState::status`] and
/// [`crate::state::RunState::error`], which carries this error's display text.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// A stage failed with an unrecoverable error; the run is aborted with no
    /// partial-success continuation.
    #[error("stage '{stage}' failed: {message}")]
    StageFailed {
        /// The stage that failed.
        stage: Stage,
        /// Human-readable description of the failure.
        message: String,
    },

    /// The overall wall-clock budget of the run elapsed.
    #[error("pipeline exceeded timeout of {seconds} seconds")]
    Timeout {
        /// The configured timeout, in seconds.
        seconds: u64,
    },

    /// The topic specification cannot be turned into a run.
    #[error("invalid topic: {reason}")]
    InvalidTopic {
        /// Description of what is wrong with the topic.
        reason: String,
    },

    /// The pipeline configuration is invalid.
    ///
    /// Produced at load time; the pipeline never starts with an invalid config.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}
