//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! section has defaults, so a missing file or a partial one is fine.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime into `SecretString`s.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::classifier::ClassifierSettings;
use crate::error::ConfigError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub backoff: BackoffConfig,
    pub supervisor: SupervisorConfig,
    pub llm: LlmConfig,
    pub polymarket: PolymarketConfig,
    pub classifier: ClassifierConfig,
    pub publisher: PublisherConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    /// Seconds between cycles once running.
    pub check_interval_secs: u64,
    /// Upper bound on a single decision-engine step.
    pub cycle_timeout_secs: u64,
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Polymarket Wisdom Tracker".to_string(),
            check_interval_secs: 2 * 60 * 60,
            cycle_timeout_secs: 15 * 60,
            verbose: true,
        }
    }
}

/// Retry policy for rate-limited initialization.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
    pub cooldown_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_retries: 5,
            cooldown_secs: 300,
        }
    }
}

/// Delays applied before exiting on an uncaught failure.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Wait before exiting when the failure looks like rate limiting.
    pub rate_limit_restart_secs: u64,
    /// Wait before exiting on any other uncaught failure.
    pub fatal_exit_delay_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            rate_limit_restart_secs: 60,
            fatal_exit_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    /// Fallback model for OpenRouter (used when primary model fails).
    pub fallback_model: Option<String>,
    pub api_key_env: String,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: "anthropic/claude-sonnet-4".to_string(),
            fallback_model: Some("x-ai/grok-4.1-fast".to_string()),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PolymarketConfig {
    pub gamma_url: String,
    pub request_timeout_secs: u64,
}

impl Default for PolymarketConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub trending_min_volume: f64,
    pub trending_limit: usize,
    pub category_limit: usize,
    pub high_confidence_limit: usize,
    pub uncertain_min_volume: f64,
    pub uncertain_limit: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let s = ClassifierSettings::default();
        Self {
            trending_min_volume: s.trending_min_volume,
            trending_limit: s.trending_limit,
            category_limit: s.category_limit,
            high_confidence_limit: s.high_confidence_limit,
            uncertain_min_volume: s.uncertain_min_volume,
            uncertain_limit: s.uncertain_limit,
        }
    }
}

impl From<&ClassifierConfig> for ClassifierSettings {
    fn from(c: &ClassifierConfig) -> Self {
        Self {
            trending_min_volume: c.trending_min_volume,
            trending_limit: c.trending_limit,
            category_limit: c.category_limit,
            high_confidence_limit: c.high_confidence_limit,
            uncertain_min_volume: c.uncertain_min_volume,
            uncertain_limit: c.uncertain_limit,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PublisherConfig {
    /// Log posts instead of sending them.
    pub dry_run: bool,
    /// Env var holding an OAuth 2.0 user-context token for the X API.
    pub bearer_token_env: String,
    pub api_url: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            bearer_token_env: "TWITTER_BEARER_TOKEN".to_string(),
            api_url: "https://api.twitter.com/2".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            info!(path, "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("agent.check_interval_secs", self.agent.check_interval_secs),
            ("agent.cycle_timeout_secs", self.agent.cycle_timeout_secs),
            ("backoff.cooldown_secs", self.backoff.cooldown_secs),
            ("backoff.max_retries", u64::from(self.backoff.max_retries)),
        ];
        for (key, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Invalid { key, reason: "must be greater than zero" });
            }
        }
        Ok(())
    }

    /// Resolve a required secret; empty values count as missing.
    pub fn require_secret(env_name: &str) -> Result<SecretString, ConfigError> {
        match std::env::var(env_name) {
            Ok(v) if !v.trim().is_empty() => Ok(SecretString::new(v)),
            _ => Err(ConfigError::MissingCredential(env_name.to_string())),
        }
    }

    /// Resolve an optional secret; empty values count as absent.
    pub fn optional_secret(env_name: &str) -> Option<SecretString> {
        std::env::var(env_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::new)
    }
}

impl AgentConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }
}
