//! Market classification.
//!
//! Pure functions that label and filter a fetched snapshot list into the
//! four views the bot reports on: trending, by category, high-confidence
//! and uncertain. None of them perform I/O or fail on missing data; the
//! neutral defaults are applied when snapshots are built.

use crate::types::{ClassifiedMarket, ConfidenceLevel, MarketSnapshot, Side};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const TRENDING_MIN_VOLUME: f64 = 5000.0;
pub const TRENDING_LIMIT: usize = 10;
pub const CATEGORY_LIMIT: usize = 10;
pub const HIGH_CONFIDENCE_LIMIT: usize = 8;
pub const UNCERTAIN_MIN_VOLUME: f64 = 3000.0;
pub const UNCERTAIN_LIMIT: usize = 8;
pub const QUESTION_MAX_LEN: usize = 80;

/// YES price above which (or NO-equivalent below which) the crowd counts
/// as highly confident.
const HIGH_CONFIDENCE_UPPER: f64 = 0.80;
const HIGH_CONFIDENCE_LOWER: f64 = 0.20;

/// Band around 50% that counts as a split decision (inclusive).
const UNCERTAIN_LOWER: f64 = 0.45;
const UNCERTAIN_UPPER: f64 = 0.55;

const ELLIPSIS: &str = "...";

/// Thresholds and limits for every view, overridable from config.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    pub trending_min_volume: f64,
    pub trending_limit: usize,
    pub category_limit: usize,
    pub high_confidence_limit: usize,
    pub uncertain_min_volume: f64,
    pub uncertain_limit: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            trending_min_volume: TRENDING_MIN_VOLUME,
            trending_limit: TRENDING_LIMIT,
            category_limit: CATEGORY_LIMIT,
            high_confidence_limit: HIGH_CONFIDENCE_LIMIT,
            uncertain_min_volume: UNCERTAIN_MIN_VOLUME,
            uncertain_limit: UNCERTAIN_LIMIT,
        }
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Confidence band from the distance of `p` to 50%.
///
/// Works on `max(p, 1 - p)` as a percentage: ≥85 very high, ≥70 high,
/// ≥60 moderate, otherwise low. The percentage is rounded to nine decimal
/// places so that `p` and `1 - p` always land in the same band.
pub fn confidence_level(p: f64) -> ConfidenceLevel {
    let p = crate::types::clamp_probability(Some(p));
    let pct = (p.max(1.0 - p) * 100.0 * 1e9).round() / 1e9;

    if pct >= 85.0 {
        ConfidenceLevel::VeryHigh
    } else if pct >= 70.0 {
        ConfidenceLevel::High
    } else if pct >= 60.0 {
        ConfidenceLevel::Moderate
    } else {
        ConfidenceLevel::Low
    }
}

/// Truncate `text` to `max_len` characters, ending in `...` when cut.
///
/// Counts and cuts on `char` boundaries, so multi-byte text is never split
/// mid-character.
pub fn shorten_question(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    if max_len <= ELLIPSIS.len() {
        return text.chars().take(max_len).collect();
    }

    let mut out: String = text.chars().take(max_len - ELLIPSIS.len()).collect();
    out.push_str(ELLIPSIS);
    out
}

fn classify(market: &MarketSnapshot, confidence: ConfidenceLevel) -> ClassifiedMarket {
    ClassifiedMarket {
        market: market.clone(),
        confidence,
        outcome: Side::from_probability(market.yes_probability),
        short_question: shorten_question(&market.question, QUESTION_MAX_LEN),
    }
}

fn classify_natural(market: &MarketSnapshot) -> ClassifiedMarket {
    classify(market, confidence_level(market.yes_probability))
}

/// Stable sort, highest 24h volume first.
fn sort_by_volume_desc(markets: &mut [&MarketSnapshot]) {
    markets.sort_by(|a, b| b.volume_24hr.total_cmp(&a.volume_24hr));
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Markets with 24h volume strictly above `min_volume`, in source order.
///
/// The Gamma query for this view is already ordered by volume, so no
/// re-sort happens here.
pub fn filter_trending(
    markets: &[MarketSnapshot],
    min_volume: f64,
    limit: usize,
) -> Vec<ClassifiedMarket> {
    markets
        .iter()
        .filter(|m| m.volume_24hr > min_volume)
        .take(limit)
        .map(classify_natural)
        .collect()
}

/// Markets whose category contains `query`, case-insensitively.
pub fn filter_by_category(
    markets: &[MarketSnapshot],
    query: &str,
    limit: usize,
) -> Vec<ClassifiedMarket> {
    let needle = query.to_lowercase();
    markets
        .iter()
        .filter(|m| m.category.to_lowercase().contains(&needle))
        .take(limit)
        .map(classify_natural)
        .collect()
}

/// Markets priced above 80% or below 20%, busiest first.
pub fn filter_high_confidence(markets: &[MarketSnapshot], limit: usize) -> Vec<ClassifiedMarket> {
    let mut picked: Vec<&MarketSnapshot> = markets
        .iter()
        .filter(|m| {
            m.yes_probability > HIGH_CONFIDENCE_UPPER || m.yes_probability < HIGH_CONFIDENCE_LOWER
        })
        .collect();
    sort_by_volume_desc(&mut picked);

    picked
        .into_iter()
        .take(limit)
        .map(|m| classify(m, ConfidenceLevel::VeryHigh))
        .collect()
}

/// Markets priced within 45–55% with volume above `min_volume`, busiest first.
pub fn filter_uncertain(
    markets: &[MarketSnapshot],
    min_volume: f64,
    limit: usize,
) -> Vec<ClassifiedMarket> {
    let mut picked: Vec<&MarketSnapshot> = markets
        .iter()
        .filter(|m| {
            (UNCERTAIN_LOWER..=UNCERTAIN_UPPER).contains(&m.yes_probability)
                && m.volume_24hr > min_volume
        })
        .collect();
    sort_by_volume_desc(&mut picked);

    picked
        .into_iter()
        .take(limit)
        .map(|m| classify(m, ConfidenceLevel::Low))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
