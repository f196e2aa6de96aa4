//! The LLM gateway: the single path from a stage node to a model provider.
//!
//! The gateway
//!
//! - routes each [`Task`] to the orchestration or writer model,
//! - reserves rate-limit budget before every call,
//! - records token usage for the run and for the process, and
//! - runs the JSON validate-then-retry loop for structured responses.
//!
//! ## JSON mode
//!
//! [`LlmGateway::ask_json`] appends a schema instruction to the conversation and
//! drives an explicit state machine:
//!
//! ```text
//! Attempt(n) ──valid──────────────▶ Success
//!     │
//!     └─invalid, n < max──▶ Retry(error) ──append feedback──▶ Attempt(n+1)
//!     │
//!     └─invalid, n = max──▶ Exhausted
//! ```
//!
//! Provider errors are not retried here; the provider applies its own
//! back-off before reporting failure.

use std::sync::Arc;

use pipeline::schema::parse_response;
use pipeline::{
    ChatMessage, CompletionRequest, LlmError, LlmProvider, ModelName, ResponseFormat, ResponseSchema,
    Role, SchemaError,
};

use crate::rate_limiter::RateLimiter;
use crate::usage::UsageCounter;
use crate::StageError;

/// Attempts made by [`LlmGateway::ask_json`] before giving up.
pub const JSON_ATTEMPTS: u32 = 3;

/// What a model call is for; decides which model serves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Plan,
    Draft,
    ExtractClaims,
    FactCheck,
    Write,
    Edit,
    Seo,
}

impl Task {
    fn uses_writer_model(self) -> bool {
        matches!(self, Self::Draft | Self::Write | Self::Edit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Draft => "draft",
            Self::ExtractClaims => "extract_claims",
            Self::FactCheck => "fact_check",
            Self::Write => "write",
            Self::Edit => "edit",
            Self::Seo => "seo",
        }
    }
}

/// Model selection and sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRouting {
    pub orchestration: ModelName,
    pub writer: ModelName,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl ModelRouting {
    fn model_for(&self, task: Task) -> &ModelName {
        if task.uses_writer_model() {
            &self.writer
        } else {
            &self.orchestration
        }
    }
}

enum JsonStep<T> {
    Attempt(u32),
    Retry { attempt: u32, error: SchemaError },
    Success(T),
    Exhausted { attempts: u32, error: SchemaError },
}

/// Shared, process-wide access to the model provider.
pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
    routing: ModelRouting,
    totals: UsageCounter,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, limiter: Arc<RateLimiter>, routing: ModelRouting) -> Self {
        Self {
            provider,
            limiter,
            routing,
            totals: UsageCounter::new(),
        }
    }

    /// Usage across every run served by this gateway.
    pub fn totals(&self) -> &UsageCounter {
        &self.totals
    }

    /// Free-text completion.
    pub async fn ask_text(
        &self,
        task: Task,
        messages: Vec<ChatMessage>,
        usage: &UsageCounter,
    ) -> Result<String, StageError> {
        Ok(self.complete(task, messages, ResponseFormat::Text, usage).await?)
    }

    /// Structured completion validated against `T`.
    pub async fn ask_json<T: ResponseSchema>(
        &self,
        task: Task,
        mut messages: Vec<ChatMessage>,
        usage: &UsageCounter,
    ) -> Result<T, StageError> {
        append_schema_instruction::<T>(&mut messages);

        let mut step = JsonStep::Attempt(1);
        loop {
            step = match step {
                JsonStep::Attempt(attempt) => {
                    let content = self
                        .complete(task, messages.clone(), ResponseFormat::JsonObject, usage)
                        .await?;
                    match parse_response::<T>(&content) {
                        Ok(value) => JsonStep::Success(value),
                        Err(error) if attempt < JSON_ATTEMPTS => JsonStep::Retry { attempt, error },
                        Err(error) => JsonStep::Exhausted { attempts: attempt, error },
                    }
                }
                JsonStep::Retry { attempt, error } => {
                    tracing::warn!(schema = T::NAME, attempt, error = %error, "model response failed validation");
                    messages.push(ChatMessage::user(corrective_feedback::<T>(&error)));
                    JsonStep::Attempt(attempt + 1)
                }
                JsonStep::Success(value) => {
                    tracing::debug!(schema = T::NAME, task = task.as_str(), "model response validated");
                    return Ok(value);
                }
                JsonStep::Exhausted { attempts, error } => {
                    tracing::error!(schema = T::NAME, attempts, error = %error, "model response validation exhausted");
                    return Err(StageError::InvalidResponse {
                        schema: T::NAME,
                        attempts,
                        last_error: error,
                    });
                }
            };
        }
    }

    async fn complete(
        &self,
        task: Task,
        messages: Vec<ChatMessage>,
        response_format: ResponseFormat,
        usage: &UsageCounter,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: self.routing.model_for(task).clone(),
            messages,
            temperature: self.routing.temperature,
            max_tokens: self.routing.max_tokens,
            response_format,
        };
        self.limiter.acquire(request.estimated_tokens()).await;

        let completion = self.provider.complete(&request).await?;
        usage.record(completion.usage);
        self.totals.record(completion.usage);
        tracing::debug!(
            provider = self.provider.name(),
            model = %request.model,
            task = task.as_str(),
            tokens = completion.usage.total().as_u64(),
            "model call completed"
        );

        if completion.content.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(completion.content)
    }
}

fn append_schema_instruction<T: ResponseSchema>(messages: &mut Vec<ChatMessage>) {
    let instruction = format!(
        "Respond ONLY with valid JSON matching the {} schema:\n{}\nDo not include any text before or after the JSON. Ensure all required fields are present and types are correct.",
        T::NAME,
        T::SHAPE
    );
    match messages.last_mut() {
        Some(last) if last.role == Role::User => {
            last.content.push_str("\n\n");
            last.content.push_str(&instruction);
        }
        _ => messages.push(ChatMessage::user(instruction)),
    }
}

fn corrective_feedback<T: ResponseSchema>(error: &SchemaError) -> String {
    format!(
        "The previous response had validation errors:\n{error}\n\nPlease provide a valid JSON response matching the {} schema exactly.",
        T::NAME
    )
}
