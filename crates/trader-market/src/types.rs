//! Price data types shared by the gateway and the indicator engine

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV candle
///
/// Histories are ordered ascending by `timestamp` with no duplicate
/// timestamps per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// Render as `timestamp: O:open H:high L:low C:close`
    pub fn price_action_line(&self) -> String {
        format!(
            "{}: O:{} H:{} L:{} C:{}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.open,
            self.high,
            self.low,
            self.close
        )
    }
}

/// Extract closing prices, oldest first
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|bar| bar.close).collect()
}

/// Rolling 24 hour statistics for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24h {
    pub symbol: String,
    pub price_change: f64,
    pub price_change_percent: f64,
    pub last_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub volume: f64,
    pub quote_volume: f64,
}
