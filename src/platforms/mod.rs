//! Market data sources.
//!
//! Defines the `MarketSource` trait and the Polymarket Gamma API
//! implementation. Sources only fetch; classification happens elsewhere.

pub mod polymarket;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::MarketSnapshot;

/// Which slice of open markets to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketQuery {
    pub limit: u32,
    /// Ask the source to order by 24h volume, busiest first.
    pub order_by_volume: bool,
}

impl MarketQuery {
    /// The busiest 50 open markets.
    pub const TRENDING: MarketQuery = MarketQuery { limit: 50, order_by_volume: true };
    /// 30 open markets in source order, for category searches.
    pub const CATEGORY: MarketQuery = MarketQuery { limit: 30, order_by_volume: false };
    /// 100 open markets in source order, for price-band scans.
    pub const WIDE: MarketQuery = MarketQuery { limit: 100, order_by_volume: false };
}

/// Abstraction over prediction market data sources.
///
/// Implementors return fresh snapshots on every call and signal network
/// or API failure through the error; they never return partial data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Fetch currently open markets.
    async fn fetch_markets(&self, query: MarketQuery) -> Result<Vec<MarketSnapshot>>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}
