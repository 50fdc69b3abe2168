//! Per-instrument analysis pipeline
//!
//! history + 24h ticker -> indicators -> prompt -> agent -> normalized text

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::persistence::Instrument;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use trader_llm::{AgentGateway, GenerationOptions};
use trader_market::{IndicatorEngine, IndicatorSet, KlineInterval, MarketDataGateway, PriceBar};
use trader_prompt::{PromptTemplate, templates};

/// Number of trailing bars quoted in the prompt
const PRICE_ACTION_BARS: usize = 5;

/// Characters of the response kept in the debug log
const PREVIEW_CHARS: usize = 150;

/// Agent answer for one instrument
///
/// The text is passed through unparsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub symbol: String,
    pub raw_text: String,
    pub timestamp: DateTime<Utc>,
}

/// Runs the analysis of a single instrument
pub struct AnalysisPipeline {
    market: Arc<dyn MarketDataGateway>,
    agent: Arc<dyn AgentGateway>,
    engine: IndicatorEngine,
    template: PromptTemplate,
    options: GenerationOptions,
    history_interval: KlineInterval,
    history_limit: usize,
    provider_timeout: Duration,
}

impl AnalysisPipeline {
    /// Pipeline using the built-in technical analysis prompt
    pub fn new(
        market: Arc<dyn MarketDataGateway>,
        agent: Arc<dyn AgentGateway>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            market,
            agent,
            engine: IndicatorEngine::default(),
            template: templates::technical_analysis(),
            options: config.generation_options(),
            history_interval: config.history_interval,
            history_limit: config.history_limit,
            provider_timeout: config.provider_timeout,
        }
    }

    /// Replace the prompt template
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Fetch history for `symbol` and compute its indicators
    ///
    /// An empty history is not an error: the engine yields its neutral
    /// values and the caller still gets a set to work with.
    pub async fn indicators(&self, symbol: &str) -> Result<(IndicatorSet, Vec<PriceBar>)> {
        let bars = self.history(symbol).await?;
        Ok((self.engine.compute_bars(&bars), bars))
    }

    async fn history(&self, symbol: &str) -> trader_market::Result<Vec<PriceBar>> {
        self.market
            .get_history(symbol, self.history_interval, self.history_limit)
            .await
    }

    /// Analyze one instrument
    ///
    /// Every failure is returned to the caller, which decides whether it
    /// ends the cycle.
    #[instrument(skip(self, instrument), fields(symbol = %instrument.symbol))]
    pub async fn analyze(&self, instrument: &Instrument) -> Result<AnalysisResult> {
        let symbol = instrument.symbol.as_str();
        let (history, ticker) =
            tokio::join!(self.history(symbol), self.market.get_ticker_24h(symbol));

        let bars = history?;
        if bars.is_empty() {
            debug!("No price history, using neutral indicators");
        }
        let indicators = self.engine.compute_bars(&bars);

        match ticker {
            Ok(ticker) => debug!(
                change_pct = ticker.price_change_percent,
                volume = ticker.volume,
                "24h ticker"
            ),
            Err(e) => debug!(error = %e, "24h ticker unavailable"),
        }

        let prompt = self
            .template
            .render(&prompt_variables(symbol, &indicators, &bars))?;

        let response = tokio::time::timeout(
            self.provider_timeout,
            self.agent.generate(&prompt, &self.options),
        )
        .await
        .map_err(|_| SchedulerError::Timeout {
            symbol: symbol.to_string(),
            after: self.provider_timeout,
        })??;

        let raw_text = response.into_text();
        debug!(
            model = %self.options.model,
            response = %preview(&raw_text),
            "Analysis complete"
        );

        Ok(AnalysisResult {
            symbol: symbol.to_string(),
            raw_text,
            timestamp: Utc::now(),
        })
    }
}

/// Variables for the technical analysis prompt
///
/// Numbers are pre-formatted with two decimals. `macd` stays an object and
/// is rendered as JSON. `currentPrice` is the last close, or 0 without
/// history.
pub fn prompt_variables(symbol: &str, indicators: &IndicatorSet, bars: &[PriceBar]) -> Value {
    let current_price = bars.last().map_or(0.0, |bar| bar.close);
    let price_action = bars[bars.len().saturating_sub(PRICE_ACTION_BARS)..]
        .iter()
        .map(PriceBar::price_action_line)
        .collect::<Vec<_>>()
        .join("\n");

    json!({
        "symbol": symbol,
        "currentPrice": fixed(current_price),
        "rsi": fixed(indicators.rsi),
        "macd": indicators.macd,
        "sma20": fixed(indicators.sma20),
        "sma50": fixed(indicators.sma50),
        "bbUpper": fixed(indicators.bollinger.upper),
        "bbMiddle": fixed(indicators.bollinger.middle),
        "bbLower": fixed(indicators.bollinger.lower),
        "priceAction": price_action,
    })
}

fn fixed(value: f64) -> String {
    format!("{value:.2}")
}

fn preview(text: &str) -> &str {
    text.char_indices()
        .nth(PREVIEW_CHARS)
        .map_or(text, |(end, _)| &text[..end])
}
