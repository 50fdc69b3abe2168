//! Environment-driven configuration helpers
//!
//! Config structs across the workspace load overrides from environment
//! variables through these helpers so parse failures surface uniformly.

use std::str::FromStr;
use thiserror::Error;

/// Error raised when an environment variable is present but malformed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Value could not be parsed into the expected type
    #[error("Invalid value for {key}: {value:?} ({detail})")]
    InvalidValue {
        key: String,
        value: String,
        detail: String,
    },
}

/// Read a non-empty environment variable
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse an environment variable
///
/// Returns `Ok(None)` when the variable is unset or empty.
pub fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| parse_value(key, &raw))
        .transpose()
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_value() {
        let secs: u64 = assert_ok!(parse_value("PRICE_SYNC_INTERVAL_SECS", "10"));
        assert_eq!(secs, 10);

        let err = assert_err!(parse_value::<u64>("PRICE_SYNC_INTERVAL_SECS", "ten"));
        assert!(err.to_string().contains("PRICE_SYNC_INTERVAL_SECS"));
    }

    #[test]
    fn test_missing_variable_is_none() {
        let value: Option<u64> = assert_ok!(env_parse("TRADER_UTILS_SURELY_UNSET_VARIABLE"));
        assert_eq!(value, None);
        assert_eq!(env_string("TRADER_UTILS_SURELY_UNSET_VARIABLE"), None);
    }
}
