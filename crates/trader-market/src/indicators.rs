//! Technical indicator engine
//!
//! All functions here are pure: they take closing prices ordered oldest
//! first and return plain numbers. Insufficient history never raises an
//! error. RSI falls back to the neutral value 50, while the moving averages
//! average over whatever samples are available.

use crate::types::{PriceBar, closes};
use serde::{Deserialize, Serialize};

/// Neutral RSI reported when there is not enough history
pub const NEUTRAL_RSI: f64 = 50.0;

/// Ratio applied to the MACD line to derive its signal line
pub const MACD_SIGNAL_RATIO: f64 = 0.9;

/// MACD line with its signal and histogram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValues {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Bollinger band triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Indicator snapshot for one instrument
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: f64,
    pub macd: MacdValues,
    pub sma20: f64,
    pub sma50: f64,
    pub ema12: f64,
    pub ema26: f64,
    pub bollinger: BollingerBands,
}

/// Periods used to build an [`IndicatorSet`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorEngine {
    pub rsi_period: usize,
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub bollinger_period: usize,
    pub bollinger_width: f64,
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            sma_fast: 20,
            sma_slow: 50,
            ema_fast: 12,
            ema_slow: 26,
            bollinger_period: 20,
            bollinger_width: 2.0,
        }
    }
}

impl IndicatorEngine {
    /// Compute every indicator over `prices` (oldest first)
    pub fn compute(&self, prices: &[f64]) -> IndicatorSet {
        IndicatorSet {
            rsi: rsi(prices, self.rsi_period),
            macd: macd(prices, self.ema_fast, self.ema_slow),
            sma20: sma(prices, self.sma_fast),
            sma50: sma(prices, self.sma_slow),
            ema12: ema(prices, self.ema_fast),
            ema26: ema(prices, self.ema_slow),
            bollinger: bollinger_bands(prices, self.bollinger_period, self.bollinger_width),
        }
    }

    /// Compute indicators from the closes of a bar history
    pub fn compute_bars(&self, bars: &[PriceBar]) -> IndicatorSet {
        self.compute(&closes(bars))
    }
}

/// Relative Strength Index over the last `period` transitions
///
/// Uses a plain trailing average of gains and losses rather than Wilder
/// smoothing. Returns [`NEUTRAL_RSI`] when fewer than `period + 1` samples
/// are available and 100 when there were no losses in the window.
pub fn rsi(prices: &[f64], period: usize) -> f64 {
    if period == 0 || prices.len() < period + 1 {
        return NEUTRAL_RSI;
    }

    let (gains, losses) = prices[prices.len() - period - 1..]
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Simple moving average of the last `period` values
///
/// With fewer than `period` values the mean is taken over all of them.
/// An empty input yields NaN.
pub fn sma(prices: &[f64], period: usize) -> f64 {
    let window = trailing(prices, period);
    window.iter().sum::<f64>() / window.len() as f64
}

/// Exponential moving average walked over the full history
///
/// The seed is the SMA of the *earliest* `period` values; the recurrence
/// then runs from index `period` to the last sample, so the result always
/// depends on the whole series.
pub fn ema(prices: &[f64], period: usize) -> f64 {
    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = &prices[..period.min(prices.len())];

    prices
        .iter()
        .skip(period)
        .fold(sma(seed, period), |ema, &price| {
            (price - ema) * multiplier + ema
        })
}

/// MACD as the difference of two EMAs
///
/// The signal line is the MACD value damped by [`MACD_SIGNAL_RATIO`], not
/// an EMA of the MACD series.
pub fn macd(prices: &[f64], fast: usize, slow: usize) -> MacdValues {
    let macd = ema(prices, fast) - ema(prices, slow);
    let signal = macd * MACD_SIGNAL_RATIO;
    MacdValues {
        macd,
        signal,
        histogram: macd - signal,
    }
}

/// Bollinger bands around the `period` SMA
///
/// Variance is the population variance of the trailing window divided by
/// `period`, so short histories narrow the bands rather than widen them.
pub fn bollinger_bands(prices: &[f64], period: usize, width: f64) -> BollingerBands {
    let middle = sma(prices, period);
    let variance = trailing(prices, period)
        .iter()
        .map(|price| (price - middle).powi(2))
        .sum::<f64>()
        / period as f64;
    let offset = variance.sqrt() * width;

    BollingerBands {
        upper: middle + offset,
        middle,
        lower: middle - offset,
    }
}

fn trailing(prices: &[f64], period: usize) -> &[f64] {
    &prices[prices.len().saturating_sub(period)..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, start: f64, step: f64) -> Vec<f64> {
        (0..len).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_rsi_insufficient_history_is_neutral() {
        assert_eq!(rsi(&[], 14), NEUTRAL_RSI);
        assert_eq!(rsi(&ramp(14, 100.0, 1.0), 14), NEUTRAL_RSI);
        assert_eq!(rsi(&[5.0, 1.0, 9.0], 3), NEUTRAL_RSI);
    }

    #[test]
    fn test_rsi_monotonic_sequences() {
        assert_eq!(rsi(&ramp(15, 100.0, 1.0), 14), 100.0);
        assert_eq!(rsi(&ramp(40, 100.0, 0.5), 14), 100.0);
        assert_eq!(rsi(&ramp(15, 100.0, -1.0), 14), 0.0);
        assert_eq!(rsi(&ramp(60, 500.0, -2.5), 14), 0.0);

        // Flat moves count as neither gain nor loss
        let mut steps = ramp(10, 100.0, 1.0);
        steps.extend([109.0, 109.0, 110.0, 110.0, 111.0]);
        assert_eq!(rsi(&steps, 14), 100.0);
    }

    #[test]
    fn test_rsi_uses_trailing_window_only() {
        // Early crash is outside the last 2 transitions
        let prices = [100.0, 10.0, 12.0, 11.0];
        // gains = 2, losses = 1 -> rs = 2 -> 100 - 100/3
        let value = rsi(&prices, 2);
        assert!((value - (100.0 - 100.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_sma() {
        assert_eq!(sma(&[10.0, 20.0, 30.0], 3), 20.0);
        assert_eq!(sma(&[1.0, 10.0, 20.0, 30.0], 3), 20.0);
        // Short history shrinks the divisor
        assert_eq!(sma(&[10.0, 20.0], 50), 15.0);
        assert!(sma(&[], 20).is_nan());
    }

    #[test]
    fn test_ema_seed_and_recurrence() {
        // Seed over the first 3 values: (1 + 2 + 3) / 3 = 2, k = 0.5
        // i=3: (4 - 2) * 0.5 + 2 = 3; i=4: (10 - 3) * 0.5 + 3 = 6.5
        assert_eq!(ema(&[1.0, 2.0, 3.0, 4.0, 10.0], 3), 6.5);

        // Fewer samples than the period: seed only, no iteration
        assert_eq!(ema(&[4.0, 8.0], 12), 6.0);
    }

    #[test]
    fn test_ema_walks_full_history() {
        let long: Vec<f64> = (0..200)
            .map(|i| 50.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1)
            .collect();
        let short = long[150..].to_vec();
        assert_ne!(ema(&long, 12), ema(&short, 12));
    }

    #[test]
    fn test_macd_signal_is_damped_line() {
        let prices = ramp(80, 10.0, 1.5);
        let values = macd(&prices, 12, 26);

        assert_eq!(values.macd, ema(&prices, 12) - ema(&prices, 26));
        assert_eq!(values.signal, values.macd * 0.9);
        assert_eq!(values.histogram, values.macd - values.signal);
        assert!(values.macd > 0.0);
    }

    #[test]
    fn test_bollinger_symmetry() {
        let series = [
            ramp(30, 100.0, 1.0),
            vec![101.3, 99.8, 104.2, 97.1, 100.0, 103.5, 98.9, 102.2],
            vec![42.0; 25],
            vec![7.5],
        ];

        for prices in &series {
            let bands = bollinger_bands(prices, 20, 2.0);
            let up = bands.upper - bands.middle;
            let down = bands.middle - bands.lower;
            assert!((up - down).abs() <= 1e-9 * bands.middle.abs().max(1.0));
            assert!(bands.upper >= bands.middle && bands.middle >= bands.lower);
        }
    }

    #[test]
    fn test_bollinger_values() {
        // Window [2, 4, 4, 4, 5, 5, 7, 9]: mean 5, population sd 2
        let prices = [100.0, 2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger_bands(&prices, 8, 2.0);
        assert_eq!(bands.middle, 5.0);
        assert_eq!(bands.upper, 9.0);
        assert_eq!(bands.lower, 1.0);

        let flat = bollinger_bands(&[42.0; 25], 20, 2.0);
        assert_eq!(flat.upper, 42.0);
        assert_eq!(flat.lower, 42.0);
    }

    #[test]
    fn test_engine_compute() {
        let prices = ramp(120, 1_000.0, 2.0);
        let set = IndicatorEngine::default().compute(&prices);

        assert_eq!(set.rsi, 100.0);
        assert_eq!(set.sma20, sma(&prices, 20));
        assert_eq!(set.sma50, sma(&prices, 50));
        assert_eq!(set.ema12, ema(&prices, 12));
        assert_eq!(set.ema26, ema(&prices, 26));
        assert_eq!(set.macd.macd, set.ema12 - set.ema26);
        assert_eq!(set.bollinger.middle, set.sma20);
    }

    #[test]
    fn test_engine_short_history_does_not_fail() {
        let set = IndicatorEngine::default().compute(&[100.0, 101.0, 99.0]);
        assert_eq!(set.rsi, NEUTRAL_RSI);
        assert_eq!(set.sma20, 100.0);
        assert_eq!(set.ema26, 100.0);
        assert_eq!(set.macd.macd, 0.0);
    }

    #[test]
    fn test_indicator_set_serializes_macd_object() {
        let set = IndicatorEngine::default().compute(&ramp(30, 1.0, 1.0));
        let json = serde_json::to_value(set.macd).unwrap();
        assert!(json.get("macd").is_some());
        assert!(json.get("signal").is_some());
        assert!(json.get("histogram").is_some());
    }
}
