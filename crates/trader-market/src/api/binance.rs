//! Binance spot REST client
//!
//! Public market endpoints only; no API key is required.
//! Rate Limit: 1200 request weight per minute

use crate::config::MarketConfig;
use crate::error::{MarketError, Result};
use crate::gateway::MarketDataGateway;
use crate::symbol::{KlineInterval, to_exchange_symbol, validate_symbol};
use crate::types::{PriceBar, Ticker24h};
use async_trait::async_trait;
use chrono::DateTime;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const PROVIDER: &str = "binance";

/// Maximum candles the kline endpoint returns per request
pub const MAX_KLINE_LIMIT: usize = 1000;

/// `/ticker/price` entry
#[derive(Debug, Clone, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// `/ticker/24hr` response (decimal fields arrive as strings)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker24h {
    symbol: String,
    price_change: String,
    price_change_percent: String,
    last_price: String,
    high_price: String,
    low_price: String,
    volume: String,
    quote_volume: String,
}

/// Binance REST client
pub struct BinanceClient {
    client: Client,
    config: MarketConfig,
    rate_limiter: SharedRateLimiter,
}

impl BinanceClient {
    /// Create a new client
    pub fn new(config: MarketConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder().timeout(config.request_timeout).build()?;
        let per_minute = NonZeroU32::new(config.rate_limit_per_minute)
            .ok_or_else(|| MarketError::ConfigError("rate limit must be non-zero".to_string()))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Create a client from environment overrides
    pub fn from_env() -> Result<Self> {
        Self::new(MarketConfig::from_env()?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.api_base, path);
        let response = self.client.get(&url).query(query).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS | StatusCode::IM_A_TEAPOT => {
                    MarketError::RateLimitExceeded {
                        provider: PROVIDER.to_string(),
                    }
                }
                StatusCode::BAD_REQUEST if body.contains("Invalid symbol") => {
                    MarketError::InvalidSymbol(body)
                }
                _ => MarketError::ApiError(format!("{PROVIDER} HTTP {status}: {body}")),
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Fetch the latest price of every listed symbol
    async fn get_all_prices(&self) -> Result<Vec<TickerPrice>> {
        self.get_json("/ticker/price", &[]).await
    }

    /// Fetch candles for `symbol`
    #[instrument(skip(self), fields(provider = PROVIDER))]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        let pair = to_exchange_symbol(symbol);
        validate_symbol(&pair)?;

        let rows: Vec<Vec<Value>> = self
            .get_json(
                "/klines",
                &[
                    ("symbol", pair.clone()),
                    ("interval", interval.as_str().to_string()),
                    ("limit", limit.clamp(1, MAX_KLINE_LIMIT).to_string()),
                ],
            )
            .await?;

        debug!(symbol = %pair, bars = rows.len(), "Fetched klines");
        rows.iter().map(|row| parse_kline(&pair, row)).collect()
    }
}

#[async_trait]
impl MarketDataGateway for BinanceClient {
    async fn get_history(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        self.get_klines(symbol, interval, limit).await
    }

    async fn get_batch_quotes(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
        let wanted: HashSet<String> = symbols.iter().map(|s| to_exchange_symbol(s)).collect();
        let prices = self.get_all_prices().await?;
        let quotes = select_quotes(&wanted, prices);

        debug!(requested = wanted.len(), found = quotes.len(), "Batch quote lookup");
        Ok(quotes)
    }

    async fn get_price(&self, symbol: &str) -> Result<f64> {
        let pair = to_exchange_symbol(symbol);
        validate_symbol(&pair)?;

        let ticker: TickerPrice = self
            .get_json("/ticker/price", &[("symbol", pair)])
            .await?;
        parse_decimal(&ticker.symbol, "price", &ticker.price)
    }

    async fn get_ticker_24h(&self, symbol: &str) -> Result<Ticker24h> {
        let pair = to_exchange_symbol(symbol);
        validate_symbol(&pair)?;

        let raw: RawTicker24h = self.get_json("/ticker/24hr", &[("symbol", pair)]).await?;
        let field = |name: &str, value: &str| parse_decimal(&raw.symbol, name, value);

        Ok(Ticker24h {
            price_change: field("priceChange", &raw.price_change)?,
            price_change_percent: field("priceChangePercent", &raw.price_change_percent)?,
            last_price: field("lastPrice", &raw.last_price)?,
            high_price: field("highPrice", &raw.high_price)?,
            low_price: field("lowPrice", &raw.low_price)?,
            volume: field("volume", &raw.volume)?,
            quote_volume: field("quoteVolume", &raw.quote_volume)?,
            symbol: raw.symbol.clone(),
        })
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

/// Keep the wanted symbols whose price parses
///
/// An unparseable price drops only that symbol.
fn select_quotes(wanted: &HashSet<String>, prices: Vec<TickerPrice>) -> HashMap<String, f64> {
    let mut quotes = HashMap::with_capacity(wanted.len());
    for ticker in prices {
        if !wanted.contains(&ticker.symbol) {
            continue;
        }
        match parse_decimal(&ticker.symbol, "price", &ticker.price) {
            Ok(price) => {
                quotes.insert(ticker.symbol, price);
            }
            Err(e) => warn!(symbol = %ticker.symbol, error = %e, "Skipping unparseable quote"),
        }
    }
    quotes
}

fn parse_decimal(symbol: &str, field: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|e| {
        MarketError::ApiError(format!("{symbol}: invalid {field} {raw:?}: {e}"))
    })
}

/// Parse one kline row: `[openTime, open, high, low, close, volume, ...]`
fn parse_kline(symbol: &str, row: &[Value]) -> Result<PriceBar> {
    let malformed = |reason: &str| MarketError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: format!("malformed kline: {reason}"),
    };

    let open_time = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("missing open time"))?;
    let timestamp = DateTime::from_timestamp_millis(open_time)
        .ok_or_else(|| malformed("open time out of range"))?;

    let decimal = |index: usize, name: &str| -> Result<f64> {
        let raw = row
            .get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(name))?;
        parse_decimal(symbol, name, raw)
    };

    Ok(PriceBar {
        symbol: symbol.to_string(),
        timestamp,
        open: decimal(1, "open")?,
        high: decimal(2, "high")?,
        low: decimal(3, "low")?,
        close: decimal(4, "close")?,
        volume: decimal(5, "volume")?,
    })
}
