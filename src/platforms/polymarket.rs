//! Polymarket integration.
//!
//! Uses the Gamma API for market discovery (no auth required).
//!
//! Gamma API: https://gamma-api.polymarket.com
//!
//! Gamma is loose about types: `outcomePrices` usually arrives as a JSON
//! string holding an array of strings (`"[\"0.65\",\"0.35\"]"`), and numeric
//! fields sometimes arrive as strings. Everything is parsed leniently and
//! missing values fall back to the neutral defaults.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::platforms::{MarketQuery, MarketSource};
use crate::types::MarketSnapshot;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Gamma API response types (market discovery)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GammaMarket {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub slug: String,
    /// Array, or a JSON string encoding one. Index 0 is the YES price.
    #[serde(default, rename = "outcomePrices")]
    pub outcome_prices: Option<Value>,
    #[serde(default, rename = "volume24hr")]
    pub volume_24hr: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "endDate")]
    pub end_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct PolymarketClient {
    http: Client,
    base_url: String,
}

impl PolymarketClient {
    pub fn new(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .context("Failed to build Polymarket HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| GAMMA_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Query parameters for a Gamma `/markets` request.
    pub fn query_params(query: MarketQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("active", "true".to_string()),
            ("closed", "false".to_string()),
            ("limit", query.limit.to_string()),
        ];
        if query.order_by_volume {
            params.push(("order", "volume24hr".to_string()));
            params.push(("ascending", "false".to_string()));
        }
        params
    }

    /// Fetch open markets from the Gamma API (no auth required).
    pub async fn fetch_gamma_markets(&self, query: MarketQuery) -> Result<Vec<GammaMarket>> {
        let url = format!("{}/markets", self.base_url);
        debug!(limit = query.limit, by_volume = query.order_by_volume, "Fetching Gamma markets");

        let resp = self
            .http
            .get(&url)
            .query(&Self::query_params(query))
            .send()
            .await
            .context("Gamma API request failed")?;

        if !resp.status().is_success() {
            return Err(ApiError::from_response("gamma", resp).await.into());
        }

        let markets: Vec<GammaMarket> = resp
            .json()
            .await
            .context("Failed to parse Gamma markets response")?;

        info!(count = markets.len(), "Fetched raw Gamma markets");
        Ok(markets)
    }

    /// Convert a Gamma market into a snapshot. Never rejects a record.
    pub fn convert_market(gm: &GammaMarket) -> MarketSnapshot {
        let yes_price = gm.outcome_prices.as_ref().and_then(Self::parse_yes_price);
        let volume = gm.volume_24hr.as_ref().and_then(value_as_f64);
        let end_date = gm.end_date.as_deref().and_then(parse_end_date);
        let category = gm.category.clone().map(|c| c.trim().to_string());

        MarketSnapshot::from_raw(gm.question.clone(), yes_price, volume, category, end_date)
    }

    /// YES price from an `outcomePrices` value, in either encoding.
    pub fn parse_yes_price(v: &Value) -> Option<f64> {
        match v {
            Value::Array(items) => items.first().and_then(value_as_f64),
            Value::String(s) => match serde_json::from_str::<Vec<Value>>(s) {
                Ok(items) => items.first().and_then(value_as_f64),
                Err(_) => Self::parse_outcome_prices(s).map(|(yes, _)| yes),
            },
            _ => None,
        }
    }

    /// Parse outcome prices from Gamma's loose string format.
    /// Handles: "[\"0.65\",\"0.35\"]", "0.65, 0.35", etc.
    pub fn parse_outcome_prices(s: &str) -> Option<(f64, f64)> {
        let cleaned = s.replace(['[', ']', '"', '\\'], "");
        let parts: Vec<&str> = cleaned.split(',').map(|p| p.trim()).collect();
        if parts.len() >= 2 {
            let yes = parts[0].parse::<f64>().ok()?;
            let no = parts[1].parse::<f64>().ok()?;
            Some((yes, no))
        } else {
            None
        }
    }
}

/// A JSON number, or a string holding one.
fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` taken as end of day UTC.
fn parse_end_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|nd| nd.and_hms_opt(23, 59, 59))
                .map(|ndt| ndt.and_utc())
        })
}

// ---------------------------------------------------------------------------
// MarketSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl MarketSource for PolymarketClient {
    async fn fetch_markets(&self, query: MarketQuery) -> Result<Vec<MarketSnapshot>> {
        let gamma_markets = self.fetch_gamma_markets(query).await?;
        Ok(gamma_markets.iter().map(Self::convert_market).collect())
    }

    fn name(&self) -> &str {
        "polymarket"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    #[test]
    fn test_parse_outcome_prices_json_format() {
        let (yes, no) = PolymarketClient::parse_outcome_prices("[\"0.65\",\"0.35\"]").unwrap();
        assert!((yes - 0.65).abs() < 1e-10);
        assert!((no - 0.35).abs() < 1e-10);
    }

    #[test]
    fn test_parse_outcome_prices_simple_format() {
        let (yes, no) = PolymarketClient::parse_outcome_prices("0.72, 0.28").unwrap();
        assert!((yes - 0.72).abs() < 1e-10);
        assert!((no - 0.28).abs() < 1e-10);
    }

    #[test]
    fn test_parse_outcome_prices_single() {
        assert!(PolymarketClient::parse_outcome_prices("0.50").is_none());
        assert!(PolymarketClient::parse_outcome_prices("").is_none());
    }

    #[test]
    fn test_parse_yes_price_encodings() {
        let stringly = json!("[\"0.81\", \"0.19\"]");
        assert_eq!(PolymarketClient::parse_yes_price(&stringly), Some(0.81));

        let array_of_strings = json!(["0.33", "0.67"]);
        assert_eq!(PolymarketClient::parse_yes_price(&array_of_strings), Some(0.33));

        let array_of_numbers = json!([0.6, 0.4]);
        assert_eq!(PolymarketClient::parse_yes_price(&array_of_numbers), Some(0.6));

        assert_eq!(PolymarketClient::parse_yes_price(&json!([])), None);
        assert_eq!(PolymarketClient::parse_yes_price(&json!(null)), None);
        assert_eq!(PolymarketClient::parse_yes_price(&json!("garbage")), None);
    }

    #[test]
    fn test_convert_market_full_record() {
        let gm: GammaMarket = serde_json::from_value(json!({
            "question": "Will Bitcoin hit $100k?",
            "slug": "bitcoin-100k",
            "outcomePrices": "[\"0.72\",\"0.28\"]",
            "volume24hr": 50000.5,
            "category": "Crypto",
            "endDate": "2026-12-31T12:00:00Z"
        }))
        .unwrap();

        let m = PolymarketClient::convert_market(&gm);
        assert_eq!(m.question, "Will Bitcoin hit $100k?");
        assert!((m.yes_probability - 0.72).abs() < 1e-10);
        assert_eq!(m.volume_24hr, 50000.5);
        assert_eq!(m.category, "Crypto");
        assert_eq!(m.end_date.unwrap().year(), 2026);
    }

    #[test]
    fn test_convert_market_sparse_record() {
        let gm: GammaMarket = serde_json::from_value(json!({ "question": "Bare?" })).unwrap();
        let m = PolymarketClient::convert_market(&gm);
        assert_eq!(m.yes_probability, 0.5);
        assert_eq!(m.volume_24hr, 0.0);
        assert_eq!(m.category, "");
        assert!(m.end_date.is_none());
    }

    #[test]
    fn test_convert_market_clamps_and_parses_strings() {
        let gm: GammaMarket = serde_json::from_value(json!({
            "question": "Odd?",
            "outcomePrices": ["1.2", "-0.2"],
            "volume24hr": "1234.5",
            "endDate": "2026-06-01"
        }))
        .unwrap();
        let m = PolymarketClient::convert_market(&gm);
        assert_eq!(m.yes_probability, 1.0);
        assert_eq!(m.volume_24hr, 1234.5);
        let end = m.end_date.unwrap();
        assert_eq!((end.month(), end.day(), end.hour()), (6, 1, 23));
    }

    #[test]
    fn test_gamma_response_array_parses() {
        let body = r#"[{"question":"A?","volume24hr":10},{"question":"B?","category":null}]"#;
        let markets: Vec<GammaMarket> = serde_json::from_str(body).unwrap();
        assert_eq!(markets.len(), 2);
        assert!(markets[1].category.is_none());
    }

    #[test]
    fn test_query_params() {
        let trending = PolymarketClient::query_params(MarketQuery::TRENDING);
        assert!(trending.contains(&("limit", "50".to_string())));
        assert!(trending.contains(&("order", "volume24hr".to_string())));
        assert!(trending.contains(&("ascending", "false".to_string())));

        let wide = PolymarketClient::query_params(MarketQuery::WIDE);
        assert!(wide.contains(&("limit", "100".to_string())));
        assert!(!wide.iter().any(|(k, _)| *k == "order"));
    }

    #[test]
    fn test_client_construction() {
        let client = PolymarketClient::new(Some("http://localhost:9/".into()), None).unwrap();
        assert_eq!(client.name(), "polymarket");
        assert_eq!(client.base_url, "http://localhost:9");
    }
}
