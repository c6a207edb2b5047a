//! Formatting helpers for market digests and posts.

use chrono::{DateTime, Utc};

/// `0.724` → `"72%"`.
pub fn format_percentage(price: f64) -> String {
    format!("{}%", (price * 100.0).round() as i64)
}

/// Compact dollar volume: `$1.2M`, `$45K`, `$950`.
pub fn format_volume(volume: f64) -> String {
    if volume >= 1_000_000.0 {
        format!("${:.1}M", volume / 1_000_000.0)
    } else if volume >= 1_000.0 {
        format!("${:.0}K", volume / 1_000.0)
    } else {
        format!("${}", volume.round() as i64)
    }
}

/// Emoji for the confidence band of a YES price.
pub fn confidence_emoji(price: f64) -> &'static str {
    match crate::classifier::confidence_level(price) {
        crate::types::ConfidenceLevel::VeryHigh => "🔥",
        crate::types::ConfidenceLevel::High => "💪",
        crate::types::ConfidenceLevel::Moderate => "🤔",
        crate::types::ConfidenceLevel::Low => "🤷",
    }
}

/// Human-friendly distance of `date` from `now` in whole days.
pub fn format_relative_date(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (date.date_naive() - now.date_naive()).num_days();
    match days {
        0 => "today".to_string(),
        -1 => "yesterday".to_string(),
        1 => "tomorrow".to_string(),
        d if (-6..0).contains(&d) => format!("{} days ago", -d),
        d if (0..7).contains(&d) => format!("in {d} days"),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}
