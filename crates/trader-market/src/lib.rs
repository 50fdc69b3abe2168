//! Market data and technical indicators
//!
//! This crate provides everything the analysis pipeline needs to know about
//! prices:
//!
//! - [`PriceBar`] history and rolling [`Ticker24h`] statistics
//! - The pure [`IndicatorEngine`] (RSI, SMA, EMA, MACD, Bollinger Bands)
//! - Exchange symbol normalization ([`to_exchange_symbol`])
//! - The [`MarketDataGateway`] seam and its Binance REST implementation
//!
//! # Example
//!
//! ```
//! use trader_market::IndicatorEngine;
//!
//! let closes: Vec<f64> = (1..=60).map(f64::from).collect();
//! let set = IndicatorEngine::default().compute(&closes);
//!
//! assert_eq!(set.rsi, 100.0);
//! assert_eq!(set.sma20, 50.5);
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod indicators;
pub mod symbol;
pub mod types;

pub use api::BinanceClient;
pub use config::MarketConfig;
pub use error::{MarketError, Result};
pub use gateway::MarketDataGateway;
pub use indicators::{BollingerBands, IndicatorEngine, IndicatorSet, MacdValues};
pub use symbol::{KlineInterval, QUOTE_ASSET, to_exchange_symbol};
pub use types::{PriceBar, Ticker24h};
