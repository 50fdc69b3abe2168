//! Exchange symbol and candle interval handling

use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quote currency appended to bare base assets
pub const QUOTE_ASSET: &str = "USDT";

/// Base assets with a known spot pair
const KNOWN_BASES: &[&str] = &[
    "BTC", "ETH", "SOL", "BNB", "ADA", "XRP", "DOT", "DOGE", "MATIC", "AVAX",
];

/// Convert a user-facing symbol into the exchange pair name
///
/// Symbols already quoted in [`QUOTE_ASSET`] are only uppercased; anything
/// else gets the quote asset appended.
///
/// ```
/// use trader_market::to_exchange_symbol;
///
/// assert_eq!(to_exchange_symbol("BTC"), "BTCUSDT");
/// assert_eq!(to_exchange_symbol("btcusdt"), "BTCUSDT");
/// assert_eq!(to_exchange_symbol("FOO"), "FOOUSDT");
/// ```
pub fn to_exchange_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    if upper.contains(QUOTE_ASSET) {
        return upper;
    }

    match KNOWN_BASES.iter().find(|base| **base == upper) {
        Some(base) => format!("{base}{QUOTE_ASSET}"),
        None => format!("{upper}{QUOTE_ASSET}"),
    }
}

/// Validate a symbol before it is sent to the exchange
pub fn validate_symbol(symbol: &str) -> Result<()> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MarketError::InvalidSymbol(symbol.to_string()));
    }
    Ok(())
}

/// Candle interval supported by the kline endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlineInterval {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "3m")]
    ThreeMinutes,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "8h")]
    EightHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1M")]
    OneMonth,
}

impl KlineInterval {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::FourHours => "4h",
            Self::SixHours => "6h",
            Self::EightHours => "8h",
            Self::TwelveHours => "12h",
            Self::OneDay => "1d",
            Self::ThreeDays => "3d",
            Self::OneWeek => "1w",
            Self::OneMonth => "1M",
        }
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KlineInterval {
    type Err = MarketError;

    // Case matters: "1m" is a minute, "1M" a month.
    fn from_str(s: &str) -> Result<Self> {
        let interval = match s.trim() {
            "1m" => Self::OneMinute,
            "3m" => Self::ThreeMinutes,
            "5m" => Self::FiveMinutes,
            "15m" => Self::FifteenMinutes,
            "30m" => Self::ThirtyMinutes,
            "1h" => Self::OneHour,
            "2h" => Self::TwoHours,
            "4h" => Self::FourHours,
            "6h" => Self::SixHours,
            "8h" => Self::EightHours,
            "12h" => Self::TwelveHours,
            "1d" => Self::OneDay,
            "3d" => Self::ThreeDays,
            "1w" => Self::OneWeek,
            "1M" => Self::OneMonth,
            other => return Err(MarketError::InvalidInterval(other.to_string())),
        };
        Ok(interval)
    }
}
