//! Request and response bodies of the chat-completions protocol, and the
//! mapping from HTTP failures to [`LlmError`].

use std::time::Duration;

use pipeline::{ChatMessage, CompletionRequest, LlmError, ResponseFormat, TokenCount, Usage};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Longest error-body excerpt carried into an error message.
const ERROR_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<FormatSpec>,
}

#[derive(Debug, Serialize)]
struct FormatSpec {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl<'a> From<&'a CompletionRequest> for ChatRequest<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: request.model.as_str(),
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: match request.response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(FormatSpec { kind: "json_object" }),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl From<ChatUsage> for Usage {
    fn from(usage: ChatUsage) -> Self {
        Usage {
            prompt_tokens: TokenCount::new(usage.prompt_tokens),
            completion_tokens: TokenCount::new(usage.completion_tokens),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Classifies a non-success response.
///
/// 429 is rate limiting (honouring `Retry-After`), 408 and 5xx are transient,
/// every other status is permanent.
pub(crate) fn classify_status(status: StatusCode, headers: &HeaderMap, body: &str) -> LlmError {
    let message = error_message(body);
    match status.as_u16() {
        429 => LlmError::RateLimited {
            retry_after: retry_after(headers),
        },
        408 | 500..=599 => LlmError::Transient {
            message: format!("HTTP {}: {message}", status.as_u16()),
        },
        code => LlmError::Permanent { status: code, message },
    }
}

/// Classifies a transport failure: timeouts and connection errors are
/// transient; anything else (for example an unreadable body) is a decode
/// failure.
pub(crate) fn classify_transport(error: &reqwest::Error) -> LlmError {
    if error.is_timeout() || error.is_connect() || error.is_request() {
        LlmError::Transient {
            message: error.to_string(),
        }
    } else {
        LlmError::Decode {
            message: error.to_string(),
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let seconds = value.parse::<f64>().ok()?;
    (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.trim().chars().take(ERROR_EXCERPT_CHARS).collect(),
    }
}
