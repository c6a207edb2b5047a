//! Shared types for the WISDOM tracker.
//!
//! Market snapshots and their classified form are plain values: produced
//! fresh on every fetch, never mutated, and dropped at the end of the
//! cycle that fetched them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// YES price assumed when a market carries no usable price.
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Market snapshot
// ---------------------------------------------------------------------------

/// A binary prediction market as seen at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub question: String,
    /// Implied YES probability, always within 0.0–1.0.
    pub yes_probability: f64,
    /// 24-hour volume in USD, never negative.
    pub volume_24hr: f64,
    /// Free-form category label; empty when the source had none.
    pub category: String,
    pub end_date: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    /// Build a snapshot from raw source values, applying the neutral
    /// defaults for anything missing.
    pub fn from_raw(
        question: impl Into<String>,
        raw_price: Option<f64>,
        volume_24hr: Option<f64>,
        category: Option<String>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            question: question.into(),
            yes_probability: clamp_probability(raw_price),
            volume_24hr: volume_24hr.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0),
            category: category.unwrap_or_default(),
            end_date,
        }
    }

    /// YES probability as a whole percentage (0–100).
    pub fn probability_pct(&self) -> u32 {
        (self.yes_probability * 100.0).round() as u32
    }
}

impl fmt::Display for MarketSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (YES: {:.0}% | vol: ${:.0} | {})",
            self.question,
            self.yes_probability * 100.0,
            self.volume_24hr,
            if self.category.is_empty() { "Other" } else { &self.category },
        )
    }
}

/// Clamp a raw YES price into 0.0–1.0; missing or non-finite prices
/// become [`NEUTRAL_PROBABILITY`].
pub fn clamp_probability(raw: Option<f64>) -> f64 {
    match raw {
        Some(p) if p.is_finite() => p.clamp(0.0, 1.0),
        _ => NEUTRAL_PROBABILITY,
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How sure the crowd is, by distance of the YES price from 50%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "VERY HIGH")]
    VeryHigh,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MODERATE")]
    Moderate,
    #[serde(rename = "LOW")]
    Low,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::VeryHigh => write!(f, "VERY HIGH"),
            ConfidenceLevel::High => write!(f, "HIGH"),
            ConfidenceLevel::Moderate => write!(f, "MODERATE"),
            ConfidenceLevel::Low => write!(f, "LOW"),
        }
    }
}

/// The outcome the crowd leans towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl Side {
    pub fn from_probability(p: f64) -> Self {
        if p * 100.0 > 50.0 {
            Side::Yes
        } else {
            Side::No
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// A snapshot plus the labels derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedMarket {
    pub market: MarketSnapshot,
    pub confidence: ConfidenceLevel,
    pub outcome: Side,
    /// Question truncated to at most 80 characters.
    pub short_question: String,
}

impl fmt::Display for ClassifiedMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {}% {} | {} confidence",
            self.short_question,
            self.market.probability_pct(),
            self.outcome,
            self.confidence,
        )
    }
}

// ---------------------------------------------------------------------------
// Engine outcomes
// ---------------------------------------------------------------------------

/// Options passed to each decision-engine step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepOptions {
    pub verbose: bool,
}

/// What a single decision-engine step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub function: String,
    pub posts_published: usize,
    /// True when the engine decided nothing was worth posting.
    pub skipped: bool,
}

/// Receipt returned after a post is accepted by the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub id: String,
    pub dry_run: bool,
}

impl PostReceipt {
    pub fn dry_run() -> Self {
        Self {
            id: format!("dry-run-{}", uuid::Uuid::new_v4()),
            dry_run: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
