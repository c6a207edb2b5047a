//! Language-model integration.
//!
//! Defines the `ChatModel` trait used by the agent to plan and write posts,
//! with implementations for OpenRouter (primary) and Anthropic.

pub mod anthropic;
pub mod openrouter;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Maximum retries on server errors. Rate limits are never retried here;
/// they surface to the caller as a 429 `ApiError`.
pub(crate) const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (ms).
pub(crate) const BASE_BACKOFF_MS: u64 = 1000;

/// Delay before retry `attempt` (1-based).
pub(crate) fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt.saturating_sub(1)))
}

/// A finished completion.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u32,
    /// Approximate cost in USD.
    pub cost: f64,
}

/// Abstraction over chat-completion providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one system + user exchange and return the reply.
    async fn complete(&self, system: &str, user: &str) -> Result<Completion>;

    /// Cheap authenticated call proving the key works and the provider is
    /// reachable.
    async fn probe(&self) -> Result<()>;

    /// Model identifier string.
    fn model_name(&self) -> &str;
}
