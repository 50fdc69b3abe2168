//! Scheduler configuration

use crate::error::{Result, SchedulerError};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use trader_llm::{DEFAULT_MODEL, GenerationOptions};
use trader_market::KlineInterval;
use trader_utils::{env_parse, env_string};

/// Largest kline page the exchange returns in one request
const MAX_HISTORY_LIMIT: usize = 1000;

/// Timing and analysis parameters for the recurring jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Period of the price sync job
    pub price_sync_interval: Duration,

    /// Period of the analysis job
    pub analysis_interval: Duration,

    /// Local time of day at which balances are snapshotted
    pub snapshot_time: NaiveTime,

    /// Candle interval fed to the indicator engine
    pub history_interval: KlineInterval,

    /// Number of candles fetched per instrument
    pub history_limit: usize,

    /// Agent model name
    pub model: String,

    /// Maximum tokens per analysis
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Upper bound on a single agent call
    pub provider_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let options = GenerationOptions::default();
        Self {
            price_sync_interval: Duration::from_secs(10),
            analysis_interval: Duration::from_secs(15),
            snapshot_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap_or_default(),
            history_interval: KlineInterval::OneHour,
            history_limit: 200,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            provider_timeout: Duration::from_secs(120),
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration builder
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Load overrides from the environment
    ///
    /// Reads `PRICE_SYNC_INTERVAL_SECS`, `ANALYSIS_INTERVAL_SECS`,
    /// `SNAPSHOT_TIME` (`HH:MM`), `HISTORY_INTERVAL`, `HISTORY_LIMIT`,
    /// `AGENT_MODEL`, `AGENT_MAX_TOKENS`, `AGENT_TEMPERATURE` and
    /// `PROVIDER_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(secs) = env_parse::<u64>("PRICE_SYNC_INTERVAL_SECS")? {
            builder = builder.price_sync_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = env_parse::<u64>("ANALYSIS_INTERVAL_SECS")? {
            builder = builder.analysis_interval(Duration::from_secs(secs));
        }
        if let Some(raw) = env_string("SNAPSHOT_TIME") {
            builder = builder.snapshot_time(parse_time_of_day(&raw)?);
        }
        if let Some(interval) = env_parse::<KlineInterval>("HISTORY_INTERVAL")? {
            builder = builder.history_interval(interval);
        }
        if let Some(limit) = env_parse::<usize>("HISTORY_LIMIT")? {
            builder = builder.history_limit(limit);
        }
        if let Some(model) = env_string("AGENT_MODEL") {
            builder = builder.model(model);
        }
        if let Some(max_tokens) = env_parse::<u32>("AGENT_MAX_TOKENS")? {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = env_parse::<f32>("AGENT_TEMPERATURE")? {
            builder = builder.temperature(temperature);
        }
        if let Some(secs) = env_parse::<u64>("PROVIDER_TIMEOUT_SECS")? {
            builder = builder.provider_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Options for each agent call
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions::new(self.model.clone())
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.price_sync_interval.is_zero() || self.analysis_interval.is_zero() {
            return Err(SchedulerError::ConfigError(
                "job intervals must be greater than 0".to_string(),
            ));
        }

        if self.history_limit == 0 || self.history_limit > MAX_HISTORY_LIMIT {
            return Err(SchedulerError::ConfigError(format!(
                "history_limit must be between 1 and {MAX_HISTORY_LIMIT}, got {}",
                self.history_limit
            )));
        }

        if self.model.trim().is_empty() {
            return Err(SchedulerError::ConfigError(
                "model must not be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(SchedulerError::ConfigError(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        if self.max_tokens == 0 || self.provider_timeout.is_zero() {
            return Err(SchedulerError::ConfigError(
                "max_tokens and provider_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| SchedulerError::ConfigError(format!("invalid time of day {raw:?}: {e}")))
}

/// Builder for SchedulerConfig
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    price_sync_interval: Option<Duration>,
    analysis_interval: Option<Duration>,
    snapshot_time: Option<NaiveTime>,
    history_interval: Option<KlineInterval>,
    history_limit: Option<usize>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    provider_timeout: Option<Duration>,
}

impl SchedulerConfigBuilder {
    pub fn price_sync_interval(mut self, interval: Duration) -> Self {
        self.price_sync_interval = Some(interval);
        self
    }

    pub fn analysis_interval(mut self, interval: Duration) -> Self {
        self.analysis_interval = Some(interval);
        self
    }

    pub fn snapshot_time(mut self, time: NaiveTime) -> Self {
        self.snapshot_time = Some(time);
        self
    }

    pub fn history_interval(mut self, interval: KlineInterval) -> Self {
        self.history_interval = Some(interval);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = Some(timeout);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<SchedulerConfig> {
        let defaults = SchedulerConfig::default();

        let config = SchedulerConfig {
            price_sync_interval: self
                .price_sync_interval
                .unwrap_or(defaults.price_sync_interval),
            analysis_interval: self.analysis_interval.unwrap_or(defaults.analysis_interval),
            snapshot_time: self.snapshot_time.unwrap_or(defaults.snapshot_time),
            history_interval: self.history_interval.unwrap_or(defaults.history_interval),
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            provider_timeout: self.provider_timeout.unwrap_or(defaults.provider_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}
