//! REST clients for market data providers

pub mod binance;

pub use binance::BinanceClient;
