//! Market data gateway seam
//!
//! The scheduler only talks to market data through this trait, which keeps
//! the analysis pipeline testable without network access.

use crate::error::Result;
use crate::symbol::KlineInterval;
use crate::types::{PriceBar, Ticker24h};
use async_trait::async_trait;
use std::collections::HashMap;

/// Source of price history and quotes
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Fetch up to `limit` bars for `symbol`, oldest first
    async fn get_history(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: usize,
    ) -> Result<Vec<PriceBar>>;

    /// Look up the latest price of every symbol in one request
    ///
    /// Keys are exchange symbols (see [`crate::to_exchange_symbol`]).
    /// Symbols the exchange does not know are absent from the map.
    async fn get_batch_quotes(&self, symbols: &[String]) -> Result<HashMap<String, f64>>;

    /// Latest price of a single symbol
    async fn get_price(&self, symbol: &str) -> Result<f64>;

    /// Rolling 24 hour statistics
    async fn get_ticker_24h(&self, symbol: &str) -> Result<Ticker24h>;

    /// Gateway name for logging
    fn name(&self) -> &str;
}
