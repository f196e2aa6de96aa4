//! Scrivener LLM provider infrastructure adapter.
//!
//! Implements the [`pipeline::LlmProvider`] trait for Groq's OpenAI-compatible
//! chat-completions API. Any other endpoint speaking the same protocol works
//! by pointing [`ChatProviderConfig::base_url`] at it.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** All HTTP transport, request formatting, response parsing,
//! `Retry-After` handling, and exponential back-off live here. The
//! [`pipeline`] crate sees only [`pipeline::LlmProvider`].

mod provider;
mod wire;

pub use provider::{ChatProvider, ChatProviderConfig, ClientError, GROQ_BASE_URL};
