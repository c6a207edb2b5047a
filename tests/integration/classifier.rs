//! Classifier properties checked through the public API.

use wisdom::classifier::{
    confidence_level, filter_by_category, filter_high_confidence, filter_trending,
    filter_uncertain, shorten_question,
};
use wisdom::types::{ConfidenceLevel, Side};

use crate::fakes::{board, snapshot};

#[test]
fn test_confidence_symmetric_over_grid() {
    for i in 0..=1000 {
        let p = i as f64 / 1000.0;
        assert_eq!(confidence_level(p), confidence_level(1.0 - p), "p = {p}");
    }
}

#[test]
fn test_confidence_bands() {
    assert_eq!(confidence_level(0.85), ConfidenceLevel::VeryHigh);
    assert_eq!(confidence_level(0.15), ConfidenceLevel::VeryHigh);
    assert_eq!(confidence_level(0.70), ConfidenceLevel::High);
    assert_eq!(confidence_level(0.60), ConfidenceLevel::Moderate);
    assert_eq!(confidence_level(0.59), ConfidenceLevel::Low);
    assert_eq!(confidence_level(0.5), ConfidenceLevel::Low);
}

#[test]
fn test_trending_excludes_low_volume() {
    let markets: Vec<_> = [0.0, 4999.0, 5000.0, 5000.01, 80_000.0]
        .iter()
        .enumerate()
        .map(|(i, v)| snapshot(&format!("Q{i}?"), 0.5, *v, ""))
        .collect();
    let trending = filter_trending(&markets, 5000.0, 10);
    assert_eq!(trending.len(), 2);
    assert!(trending.iter().all(|c| c.market.volume_24hr > 5000.0));
    // Source order is kept.
    assert_eq!(trending[0].market.question, "Q3?");
}

#[test]
fn test_high_confidence_band_edges() {
    let markets: Vec<_> = [0.19, 0.20, 0.50, 0.80, 0.81]
        .iter()
        .map(|p| snapshot(&format!("{p}?"), *p, 1000.0, ""))
        .collect();
    let picked = filter_high_confidence(&markets, 8);
    let probs: Vec<f64> = picked.iter().map(|c| c.market.yes_probability).collect();
    assert_eq!(probs, vec![0.19, 0.81]);
    assert!(picked.iter().all(|c| c.confidence == ConfidenceLevel::VeryHigh));
    assert_eq!(picked[0].outcome, Side::No);
    assert_eq!(picked[1].outcome, Side::Yes);
}

#[test]
fn test_uncertain_volume_floor() {
    let markets = vec![snapshot("Busy?", 0.50, 4000.0, ""), snapshot("Quiet?", 0.50, 2000.0, "")];
    let picked = filter_uncertain(&markets, 3000.0, 8);
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].market.question, "Busy?");
    assert_eq!(picked[0].confidence, ConfidenceLevel::Low);
}

#[test]
fn test_category_match_is_case_insensitive_substring() {
    let picked = filter_by_category(&board(), "POLIT", 10);
    assert_eq!(picked.len(), 2);
    assert!(filter_by_category(&board(), "sports", 10).is_empty());
}

#[test]
fn test_shorten_question() {
    let long = "a".repeat(100);
    let short = shorten_question(&long, 80);
    assert_eq!(short.chars().count(), 80);
    assert!(short.ends_with("..."));
    assert_eq!(shorten_question("short", 80), "short");
}

#[test]
fn test_classifier_is_idempotent() {
    let markets = board();
    assert_eq!(filter_trending(&markets, 5000.0, 10), filter_trending(&markets, 5000.0, 10));
    assert_eq!(filter_high_confidence(&markets, 8), filter_high_confidence(&markets, 8));
    assert_eq!(filter_uncertain(&markets, 3000.0, 8), filter_uncertain(&markets, 3000.0, 8));
}
