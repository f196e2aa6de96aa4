//! The chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{Completion, CompletionRequest, LlmError, LlmProvider, RetryPolicy, Usage};
use thiserror::Error;

use crate::wire::{classify_status, classify_transport, ChatRequest, ChatResponse};

/// Groq's OpenAI-compatible API root.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Errors constructing a provider.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("an API key is required")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Connection and retry settings.
#[derive(Debug, Clone)]
pub struct ChatProviderConfig {
    pub api_key: String,
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Total attempts per completion, including the first.
    pub max_attempts: u32,
    /// Back-off before the second attempt; doubles for each later one.
    pub base_delay: Duration,
}

impl ChatProviderConfig {
    /// Groq defaults: 60 s requests, 3 attempts, 1 s base back-off.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GROQ_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(60),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// [`LlmProvider`] over an OpenAI-compatible `chat/completions` endpoint.
///
/// Retryable failures (429, 408, 5xx, timeouts, connection errors) are
/// retried with exponential back-off, or after the server's `Retry-After`
/// delay when one is given. Other failures are returned immediately.
pub struct ChatProvider {
    client: reqwest::Client,
    chat_url: String,
    api_key: String,
    max_attempts: u32,
    base_delay: Duration,
}

impl ChatProvider {
    pub fn new(config: ChatProviderConfig) -> Result<Self, ClientError> {
        if config.api_key.trim().is_empty() {
            return Err(ClientError::MissingApiKey);
        }
        let client = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            chat_url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key,
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let response = self
            .client
            .post(&self.chat_url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::from(request))
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;
        if !status.is_success() {
            return Err(classify_status(status, &headers, &body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| LlmError::Decode {
            message: e.to_string(),
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;
        Ok(Completion {
            content,
            usage: parsed.usage.map(Usage::from).unwrap_or_default(),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[async_trait]
impl LlmProvider for ChatProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let mut attempt = 1;
        loop {
            let error = match self.send(request).await {
                Ok(completion) => {
                    tracing::debug!(
                        model = %request.model,
                        attempt,
                        prompt_tokens = completion.usage.prompt_tokens.as_u64(),
                        completion_tokens = completion.usage.completion_tokens.as_u64(),
                        "chat completion succeeded"
                    );
                    return Ok(completion);
                }
                Err(error) => error,
            };

            match error.retry_policy() {
                RetryPolicy::Retryable { after } if attempt < self.max_attempts => {
                    let delay = after.unwrap_or_else(|| self.backoff(attempt));
                    tracing::warn!(
                        model = %request.model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "chat completion failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                _ => {
                    tracing::error!(model = %request.model, attempt, error = %error, "chat completion failed");
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            ChatProvider::new(ChatProviderConfig::groq("  ")),
            Err(ClientError::MissingApiKey)
        ));
    }

    #[test]
    fn backoff_doubles() {
        let provider = ChatProvider::new(ChatProviderConfig::groq("key")).unwrap();
        assert_eq!(provider.backoff(1), Duration::from_secs(1));
        assert_eq!(provider.backoff(2), Duration::from_secs(2));
        assert_eq!(provider.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let mut config = ChatProviderConfig::groq("key");
        config.base_url = "http://localhost:1234/v1/".into();
        let provider = ChatProvider::new(config).unwrap();
        assert_eq!(provider.chat_url, "http://localhost:1234/v1/chat/completions");
    }
}
