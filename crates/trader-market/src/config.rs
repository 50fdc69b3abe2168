//! Configuration for market data access

use crate::error::{MarketError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trader_utils::{env_parse, env_string};

const DEFAULT_API_BASE: &str = "https://api.binance.com/api/v3";

/// Configuration for the market data client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Base URL of the REST API
    pub api_base: String,

    /// Request timeout duration
    pub request_timeout: Duration,

    /// Client side request budget per minute
    pub rate_limit_per_minute: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            rate_limit_per_minute: 1200,
        }
    }
}

impl MarketConfig {
    /// Create a new configuration builder
    pub fn builder() -> MarketConfigBuilder {
        MarketConfigBuilder::default()
    }

    /// Load overrides from `BINANCE_API_BASE`, `MARKET_REQUEST_TIMEOUT_SECS`
    /// and `MARKET_RATE_LIMIT_PER_MINUTE`
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(base) = env_string("BINANCE_API_BASE") {
            builder = builder.api_base(base);
        }
        if let Some(secs) = env_parse::<u64>("MARKET_REQUEST_TIMEOUT_SECS")? {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if let Some(limit) = env_parse::<u32>("MARKET_RATE_LIMIT_PER_MINUTE")? {
            builder = builder.rate_limit_per_minute(limit);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(MarketError::ConfigError(format!(
                "api_base must be an http(s) URL, got {}",
                self.api_base
            )));
        }

        if self.rate_limit_per_minute == 0 {
            return Err(MarketError::ConfigError(
                "rate_limit_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(MarketError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for MarketConfig
#[derive(Debug, Default)]
pub struct MarketConfigBuilder {
    api_base: Option<String>,
    request_timeout: Option<Duration>,
    rate_limit_per_minute: Option<u32>,
}

impl MarketConfigBuilder {
    /// Set the REST base URL
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the per-minute request budget
    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = Some(limit);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MarketConfig> {
        let defaults = MarketConfig::default();

        let config = MarketConfig {
            api_base: self
                .api_base
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            rate_limit_per_minute: self
                .rate_limit_per_minute
                .unwrap_or(defaults.rate_limit_per_minute),
        };

        config.validate()?;
        Ok(config)
    }
}
