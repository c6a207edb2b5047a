//! Market worker.
//!
//! The set of named market functions the decision engine can choose from
//! during a step. Each function fetches a fresh snapshot list, runs one
//! classifier view over it, and returns a JSON payload for the model.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::classifier::{self, ClassifierSettings};
use crate::platforms::{MarketQuery, MarketSource};
use crate::types::{ClassifiedMarket, ConfidenceLevel, Side};

pub const WORKER_DESCRIPTION: &str = "Fetches and analyzes Polymarket prediction markets to \
understand what the crowd thinks. It can find trending markets with high trading activity, \
get markets by category (politics, crypto, sports, etc), identify markets where the crowd \
has high confidence, and find markets where the crowd is uncertain or split.";

/// A worker function with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketFunction {
    Trending,
    ByCategory(String),
    HighConfidence,
    Uncertain,
}

impl MarketFunction {
    pub const TRENDING: &'static str = "get_trending_markets";
    pub const BY_CATEGORY: &'static str = "get_markets_by_category";
    pub const HIGH_CONFIDENCE: &'static str = "get_high_confidence_markets";
    pub const UNCERTAIN: &'static str = "get_uncertain_markets";

    /// Category used when the model picks a category search without one.
    pub const DEFAULT_CATEGORY: &'static str = "politics";

    pub fn name(&self) -> &'static str {
        match self {
            MarketFunction::Trending => Self::TRENDING,
            MarketFunction::ByCategory(_) => Self::BY_CATEGORY,
            MarketFunction::HighConfidence => Self::HIGH_CONFIDENCE,
            MarketFunction::Uncertain => Self::UNCERTAIN,
        }
    }

    /// Resolve a function name plus optional argument.
    pub fn from_name(name: &str, arg: Option<&str>) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            Self::TRENDING => Some(MarketFunction::Trending),
            Self::BY_CATEGORY => {
                let category = arg
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .unwrap_or(Self::DEFAULT_CATEGORY);
                Some(MarketFunction::ByCategory(category.to_string()))
            }
            Self::HIGH_CONFIDENCE => Some(MarketFunction::HighConfidence),
            Self::UNCERTAIN => Some(MarketFunction::Uncertain),
            _ => None,
        }
    }

    /// One-line descriptions for the planning prompt.
    pub fn catalog() -> &'static [(&'static str, &'static str)] {
        &[
            (Self::TRENDING, "the most active markets by 24hr volume (no args)"),
            (
                Self::BY_CATEGORY,
                "active markets in one category; ARGS is the category, e.g. politics, crypto, sports",
            ),
            (Self::HIGH_CONFIDENCE, "markets where the crowd is above 80% or below 20% (no args)"),
            (Self::UNCERTAIN, "markets where the crowd is split close to 50/50 (no args)"),
        ]
    }

    fn query(&self) -> MarketQuery {
        match self {
            MarketFunction::Trending => MarketQuery::TRENDING,
            MarketFunction::ByCategory(_) => MarketQuery::CATEGORY,
            MarketFunction::HighConfidence | MarketFunction::Uncertain => MarketQuery::WIDE,
        }
    }
}

impl fmt::Display for MarketFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketFunction::ByCategory(c) => write!(f, "{}({c})", self.name()),
            other => write!(f, "{}", other.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// One market as reported back to the model.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarketEntry {
    pub question: String,
    /// Rounded YES percentage.
    pub probability: u32,
    #[serde(rename = "volume24hr")]
    pub volume_24hr: u64,
    pub confidence: ConfidenceLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl MarketEntry {
    fn basic(c: &ClassifiedMarket) -> Self {
        Self {
            question: c.short_question.clone(),
            probability: c.market.probability_pct(),
            volume_24hr: c.market.volume_24hr.round() as u64,
            confidence: c.confidence,
            outcome: None,
            category: None,
            end_date: None,
        }
    }
}

/// Result of running a worker function.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunctionOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub count: usize,
    pub markets: Vec<MarketEntry>,
}

impl FunctionOutput {
    fn new(category: Option<String>, markets: Vec<MarketEntry>) -> Self {
        Self {
            category,
            count: markets.len(),
            markets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize function output")
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

pub struct WisdomWorker {
    source: Arc<dyn MarketSource>,
    settings: ClassifierSettings,
}

impl WisdomWorker {
    pub fn new(source: Arc<dyn MarketSource>, settings: ClassifierSettings) -> Self {
        Self { source, settings }
    }

    /// Run one function against a fresh fetch.
    ///
    /// Fetch failures propagate unchanged so callers can still see an
    /// upstream 429.
    pub async fn execute(&self, function: &MarketFunction) -> Result<FunctionOutput> {
        let markets = self
            .source
            .fetch_markets(function.query())
            .await
            .with_context(|| format!("{function} failed to fetch from {}", self.source.name()))?;
        let s = &self.settings;

        let output = match function {
            MarketFunction::Trending => {
                let entries = classifier::filter_trending(&markets, s.trending_min_volume, s.trending_limit)
                    .iter()
                    .map(|c| MarketEntry {
                        category: Some(if c.market.category.is_empty() {
                            "Other".to_string()
                        } else {
                            c.market.category.clone()
                        }),
                        end_date: c.market.end_date.map(|d| d.to_rfc3339()),
                        ..MarketEntry::basic(c)
                    })
                    .collect();
                FunctionOutput::new(None, entries)
            }
            MarketFunction::ByCategory(category) => {
                let entries = classifier::filter_by_category(&markets, category, s.category_limit)
                    .iter()
                    .map(MarketEntry::basic)
                    .collect();
                FunctionOutput::new(Some(category.clone()), entries)
            }
            MarketFunction::HighConfidence => {
                let entries = classifier::filter_high_confidence(&markets, s.high_confidence_limit)
                    .iter()
                    .map(|c| MarketEntry {
                        outcome: Some(c.outcome),
                        ..MarketEntry::basic(c)
                    })
                    .collect();
                FunctionOutput::new(None, entries)
            }
            MarketFunction::Uncertain => {
                let entries =
                    classifier::filter_uncertain(&markets, s.uncertain_min_volume, s.uncertain_limit)
                        .iter()
                        .map(MarketEntry::basic)
                        .collect();
                FunctionOutput::new(None, entries)
            }
        };

        info!(
            function = %function,
            fetched = markets.len(),
            selected = output.count,
            "Worker function complete"
        );
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
