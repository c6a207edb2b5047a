//! OpenRouter LLM integration.
//!
//! Routes all LLM calls through OpenRouter's unified API, giving access to
//! multiple model providers with a single API key. Uses the OpenAI-compatible
//! chat completions format.
//!
//! Primary model: Claude 4 Sonnet (best at neutral, well-formed copy).
//! Fallback model: Grok-4.1-fast (cheap & fast, used when primary fails).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::{retry_delay, ChatModel, Completion, MAX_RETRIES};
use crate::error::{is_rate_limited, ApiError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENROUTER_KEY_URL: &str = "https://openrouter.ai/api/v1/key";

/// Default primary model: Claude 4 Sonnet via OpenRouter.
const DEFAULT_PRIMARY_MODEL: &str = "anthropic/claude-sonnet-4";

/// Default fallback model: Grok-4.1-fast via OpenRouter (cheap/fast).
const DEFAULT_FALLBACK_MODEL: &str = "x-ai/grok-4.1-fast";

const DEFAULT_MAX_TOKENS: u32 = 1024;

// ---------------------------------------------------------------------------
// Cost tables (approximate per-1K-token pricing via OpenRouter)
// ---------------------------------------------------------------------------

/// Returns (input_cost_per_1k, output_cost_per_1k) for known models.
fn model_costs(model: &str) -> (f64, f64) {
    match model {
        m if m.contains("claude") && m.contains("sonnet") => (0.003, 0.015),
        m if m.contains("claude") && m.contains("opus") => (0.015, 0.075),
        m if m.contains("claude") && m.contains("haiku") => (0.0008, 0.004),
        m if m.contains("grok") => (0.003, 0.015),
        // Conservative default
        _ => (0.005, 0.015),
    }
}

// ---------------------------------------------------------------------------
// API types (OpenAI-compatible)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenRouterClient {
    http: Client,
    api_key: SecretString,
    primary_model: String,
    fallback_model: Option<String>,
    max_tokens: u32,
    total_cost: AtomicU64, // stored as cost * 1_000_000
    total_calls: AtomicU64,
}

impl OpenRouterClient {
    /// Create a new OpenRouter client.
    ///
    /// - `api_key`: OpenRouter API key.
    /// - `primary_model`: Primary model ID (e.g. "anthropic/claude-sonnet-4").
    /// - `fallback_model`: Optional fallback model for when primary fails.
    /// - `max_tokens`: Max output tokens per request.
    pub fn new(
        api_key: SecretString,
        primary_model: Option<String>,
        fallback_model: Option<String>,
        max_tokens: Option<u32>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to build OpenRouter HTTP client")?;

        Ok(Self {
            http,
            api_key,
            primary_model: primary_model.unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model: Some(
                fallback_model.unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            ),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            total_cost: AtomicU64::new(0),
            total_calls: AtomicU64::new(0),
        })
    }

    /// Send a chat completion request for a specific model, retrying
    /// server errors with exponential backoff.
    async fn call_model(&self, model: &str, system: &str, user_message: &str) -> Result<Completion> {
        let request = ChatRequest {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message.to_string(),
                },
            ],
        };

        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = retry_delay(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, model, "Retrying OpenRouter API call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(OPENROUTER_API_URL)
                .bearer_auth(self.api_key.expose_secret())
                .header("X-Title", "WISDOM Crowd Tracker")
                .json(&request)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body: ChatResponse = response
                            .json()
                            .await
                            .context("Failed to parse OpenRouter response")?;
                        return Ok(self.record(body, model));
                    }

                    let err = ApiError::from_response("openrouter", response).await;
                    if err.is_rate_limited() || status.is_client_error() {
                        return Err(err.into());
                    }

                    warn!(status = %status, attempt, model, error = %err.message, "Retryable OpenRouter error");
                    last_error = Some(err);
                }
                Err(e) => {
                    warn!(attempt, model, error = %e, "OpenRouter request failed");
                    last_error = Some(ApiError::new("openrouter", 0, format!("Request error: {e}")));
                }
            }
        }

        let err = last_error.unwrap_or_else(|| ApiError::new("openrouter", 0, "no attempts made"));
        Err(anyhow::Error::new(err)
            .context(format!("OpenRouter API failed after {MAX_RETRIES} retries (model={model})")))
    }

    /// Turn a successful response into a completion and track its cost.
    fn record(&self, body: ChatResponse, requested_model: &str) -> Completion {
        let text = body
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let usage = body.usage.unwrap_or_default();

        // Use the actual model returned (may differ from requested)
        let actual_model = body.model.as_deref().unwrap_or(requested_model);
        let (input_cost, output_cost) = model_costs(actual_model);

        let cost = (usage.prompt_tokens as f64 / 1000.0) * input_cost
            + (usage.completion_tokens as f64 / 1000.0) * output_cost;

        self.total_cost.fetch_add((cost * 1_000_000.0) as u64, Ordering::Relaxed);
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        Completion {
            text,
            tokens_used: usage.total_tokens,
            cost,
        }
    }

    /// Total cumulative cost across all calls.
    pub fn cumulative_cost(&self) -> f64 {
        self.total_cost.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// Total number of API calls made.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    /// Call the primary model, falling back to the secondary when the
    /// primary fails for any reason other than rate limiting.
    async fn complete(&self, system: &str, user: &str) -> Result<Completion> {
        let primary_err = match self.call_model(&self.primary_model, system, user).await {
            Ok(completion) => return Ok(completion),
            Err(e) => e,
        };

        match self.fallback_model {
            Some(ref fallback) if !is_rate_limited(&primary_err) => {
                warn!(
                    primary = %self.primary_model,
                    fallback = %fallback,
                    error = %primary_err,
                    "Primary model failed, falling back"
                );
                self.call_model(fallback, system, user).await.with_context(|| {
                    format!(
                        "Both primary ({}) and fallback ({}) models failed. Primary error: {}",
                        self.primary_model, fallback, primary_err
                    )
                })
            }
            _ => Err(primary_err),
        }
    }

    async fn probe(&self) -> Result<()> {
        let resp = self
            .http
            .get(OPENROUTER_KEY_URL)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .context("OpenRouter key check failed")?;

        if !resp.status().is_success() {
            return Err(ApiError::from_response("openrouter", resp).await.into());
        }
        debug!(model = %self.primary_model, "OpenRouter key verified");
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.primary_model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
