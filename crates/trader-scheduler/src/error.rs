//! Error types for scheduled jobs

use std::time::Duration;
use thiserror::Error;
use trader_llm::LLMError;
use trader_market::MarketError;
use trader_prompt::PromptError;

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors raised by jobs and their collaborators
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Market data could not be fetched
    #[error(transparent)]
    Market(#[from] MarketError),

    /// The agent call failed
    #[error(transparent)]
    Agent(#[from] LLMError),

    /// The prompt could not be composed
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Persistence gateway failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The agent did not answer within the provider timeout
    #[error("Analysis of {symbol} timed out after {after:?}")]
    Timeout { symbol: String, after: Duration },

    /// Job name not recognised
    #[error("Unknown job: {0} (expected price-sync, analysis or snapshot)")]
    UnknownJob(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<trader_utils::ConfigError> for SchedulerError {
    fn from(err: trader_utils::ConfigError) -> Self {
        SchedulerError::ConfigError(err.to_string())
    }
}
