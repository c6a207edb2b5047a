//! Post publishing.
//!
//! `Publisher` accepts finished post text. The X API v2 implementation
//! posts with a user bearer token; the log publisher only records what
//! would have been posted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::types::PostReceipt;

/// Hard length limit for a single post, in characters.
pub const MAX_POST_CHARS: usize = 280;

const DEFAULT_API_URL: &str = "https://api.twitter.com/2";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Abstraction over where finished posts go.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Confirm the credentials work. Called once during initialization.
    async fn verify(&self) -> Result<()>;

    /// Publish one post.
    async fn publish(&self, text: &str) -> Result<PostReceipt>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// X API v2
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Me {
    #[serde(default)]
    username: String,
}

pub struct TwitterPublisher {
    http: Client,
    base_url: String,
    bearer_token: SecretString,
}

impl TwitterPublisher {
    pub fn new(bearer_token: SecretString, base_url: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build X API HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            bearer_token,
        })
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    async fn verify(&self) -> Result<()> {
        let resp = self
            .http
            .get(format!("{}/users/me", self.base_url))
            .bearer_auth(self.bearer_token.expose_secret())
            .send()
            .await
            .context("X API verify request failed")?;

        if !resp.status().is_success() {
            return Err(ApiError::from_response("twitter", resp).await.into());
        }

        let me: Envelope<Me> = resp.json().await.context("Failed to parse X API user response")?;
        info!(username = %me.data.username, "X API credentials verified");
        Ok(())
    }

    async fn publish(&self, text: &str) -> Result<PostReceipt> {
        let resp = self
            .http
            .post(format!("{}/tweets", self.base_url))
            .bearer_auth(self.bearer_token.expose_secret())
            .json(&CreateTweetRequest { text })
            .send()
            .await
            .context("X API post request failed")?;

        if !resp.status().is_success() {
            return Err(ApiError::from_response("twitter", resp).await.into());
        }

        let created: Envelope<CreatedTweet> =
            resp.json().await.context("Failed to parse X API post response")?;
        info!(id = %created.data.id, chars = text.chars().count(), "Post published");
        Ok(PostReceipt {
            id: created.data.id,
            dry_run: false,
        })
    }

    fn name(&self) -> &str {
        "twitter"
    }
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// Logs posts instead of sending them.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn verify(&self) -> Result<()> {
        debug!("Dry-run publisher needs no credentials");
        Ok(())
    }

    async fn publish(&self, text: &str) -> Result<PostReceipt> {
        let receipt = PostReceipt::dry_run();
        info!(id = %receipt.id, text, "Dry run: post not sent");
        Ok(receipt)
    }

    fn name(&self) -> &str {
        "dry-run"
    }
}
