//! Anthropic Claude LLM integration.
//!
//! Implements `ChatModel` directly against the Anthropic Messages API, for
//! deployments that hold an Anthropic key instead of an OpenRouter one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::{retry_delay, ChatModel, Completion, MAX_RETRIES};
use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_MODELS_URL: &str = "https://api.anthropic.com/v1/models";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Overloaded. Retried like a 5xx.
const OVERLOADED_STATUS: u16 = 529;

/// Approximate cost per 1K input tokens (Sonnet).
const INPUT_COST_PER_1K: f64 = 0.003;
/// Approximate cost per 1K output tokens (Sonnet).
const OUTPUT_COST_PER_1K: f64 = 0.015;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct AnthropicClient {
    http: Client,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
    total_cost: AtomicU64, // stored as cost * 1_000_000
    total_calls: AtomicU64,
}

impl AnthropicClient {
    pub fn new(api_key: SecretString, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build Anthropic HTTP client")?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_cost: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
        })
    }

    fn request(&self, system: &str, user_message: &str) -> MessagesRequest {
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message.to_string(),
            }],
            system: Some(system.to_string()),
        }
    }

    fn record(&self, body: MessagesResponse) -> Completion {
        let text = body
            .content
            .iter()
            .filter(|b| b.content_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let usage = body.usage.unwrap_or_default();
        let cost = (usage.input_tokens as f64 / 1000.0) * INPUT_COST_PER_1K
            + (usage.output_tokens as f64 / 1000.0) * OUTPUT_COST_PER_1K;

        self.total_cost.fetch_add((cost * 1_000_000.0) as u64, Ordering::Relaxed);
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        Completion {
            text,
            tokens_used: usage.input_tokens + usage.output_tokens,
            cost,
        }
    }

    /// Total cumulative cost across all calls.
    pub fn cumulative_cost(&self) -> f64 {
        self.total_cost.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    /// Send a messages request, retrying server errors and overload with
    /// backoff. A 429 is returned immediately.
    async fn complete(&self, system: &str, user: &str) -> Result<Completion> {
        let request = self.request(system, user);
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying Anthropic API call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", self.api_key.expose_secret())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: MessagesResponse = response
                            .json()
                            .await
                            .context("Failed to parse Anthropic response")?;
                        return Ok(self.record(body));
                    }

                    let err = ApiError::from_response("anthropic", response).await;
                    let retryable = status.is_server_error() || err.status == OVERLOADED_STATUS;
                    if !retryable {
                        return Err(err.into());
                    }

                    warn!(status = %status, attempt, error = %err.message, "Retryable Anthropic API error");
                    last_error = Some(err);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Anthropic request failed");
                    last_error = Some(ApiError::new("anthropic", 0, format!("Request error: {e}")));
                }
            }
        }

        let err = last_error.unwrap_or_else(|| ApiError::new("anthropic", 0, "no attempts made"));
        Err(anyhow::Error::new(err).context(format!("Anthropic API failed after {MAX_RETRIES} retries")))
    }

    async fn probe(&self) -> Result<()> {
        let resp = self
            .http
            .get(ANTHROPIC_MODELS_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .context("Anthropic models check failed")?;

        if !resp.status().is_success() {
            return Err(ApiError::from_response("anthropic", resp).await.into());
        }
        debug!(model = %self.model, "Anthropic key verified");
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
