//! Error types and failure classification.
//!
//! Every HTTP integration turns a non-2xx response into an [`ApiError`]
//! carrying the status code, so the scheduler can tell rate limiting apart
//! from everything else without knowing which service failed. Errors
//! travel as `anyhow::Error`; [`is_rate_limited`] walks the chain.

use std::time::Duration;
use thiserror::Error;

/// HTTP status used by every upstream for rate limiting.
pub const RATE_LIMIT_STATUS: u16 = 429;

/// A non-success response from an upstream API.
#[derive(Debug, Error)]
#[error("{service} API error (status={status}): {message}")]
pub struct ApiError {
    pub service: &'static str,
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(service: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self {
            service,
            status,
            message: message.into(),
        }
    }

    /// Build from a failed response, consuming its body for the message.
    pub async fn from_response(service: &'static str, resp: reqwest::Response) -> Self {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            body
        };
        Self::new(service, status.as_u16(), message)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == RATE_LIMIT_STATUS
    }
}

/// Failure classes the process reacts to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Upstream said 429. Retried with backoff at init, ignored in cycles.
    RateLimited,
    /// Any other network or API failure. Logged; the cycle is skipped.
    TransientIo,
    /// A required credential is missing. Exit immediately.
    FatalConfig,
    /// Initialization failed for a reason other than rate limiting.
    FatalInit,
}

/// Raised when a required setting is absent or unusable at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required credential: environment variable {0} is not set")]
    MissingCredential(String),

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

/// Why the scheduler stopped.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Initialization failed for a reason that retrying will not fix.
    #[error("Initialization failed: {0:#}")]
    FatalInit(anyhow::Error),

    /// A cycle task panicked.
    #[error("Uncaught failure: {0}")]
    Uncaught(String),
}

/// Why a single cycle did not complete.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Rate limited: {0:#}")]
    RateLimited(anyhow::Error),

    #[error("Cycle failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("Cycle timed out after {0:?}")]
    TimedOut(Duration),
}

impl CycleError {
    /// Wrap a step failure, separating rate limits from other failures.
    pub fn from_step(err: anyhow::Error) -> Self {
        if is_rate_limited(&err) {
            CycleError::RateLimited(err)
        } else {
            CycleError::Failed(err)
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            CycleError::RateLimited(_) => FailureClass::RateLimited,
            CycleError::Failed(_) | CycleError::TimedOut(_) => FailureClass::TransientIo,
        }
    }
}

/// True if any error in the chain is a 429 or reads like one.
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    for cause in err.chain() {
        if let Some(api) = cause.downcast_ref::<ApiError>() {
            if api.is_rate_limited() {
                return true;
            }
        }
        if let Some(req) = cause.downcast_ref::<reqwest::Error>() {
            if req.status().map(|s| s.as_u16()) == Some(RATE_LIMIT_STATUS) {
                return true;
            }
        }
    }
    message_signals_rate_limit(&format!("{err:#}"))
}

/// Rate-limit signature in free text: "429" or "Too Many Requests".
pub fn message_signals_rate_limit(message: &str) -> bool {
    message.contains("429") || message.to_lowercase().contains("too many requests")
}

/// Classify an initialization failure.
pub fn classify_init_error(err: &anyhow::Error) -> FailureClass {
    if err.chain().any(|c| c.downcast_ref::<ConfigError>().is_some()) {
        FailureClass::FatalConfig
    } else if is_rate_limited(err) {
        FailureClass::RateLimited
    } else {
        FailureClass::FatalInit
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
