//! Built-in prompts

use crate::PromptTemplate;

/// Name under which [`technical_analysis`] is registered
pub const TECHNICAL_ANALYSIS: &str = "technical_analysis";

const TECHNICAL_ANALYSIS_SOURCE: &str = "\
You are an expert technical analyst for stock trading.
Analyze the following technical data for {symbol}:

Current Price: {currentPrice}
RSI: {rsi}
MACD: {macd}
SMA 20: {sma20}
SMA 50: {sma50}
Bollinger Bands: Upper {bbUpper}, Middle {bbMiddle}, Lower {bbLower}

Recent Price Action (last 5 periods):
{priceAction}

Provide a concise analysis including:
1. Overall trend assessment
2. Key support and resistance levels
3. Trading recommendation (BUY/SELL/HOLD)
4. Confidence level (0-100)
5. Risk factors

Format your response as JSON with fields: recommendation, confidence, reasoning, supportLevel, resistanceLevel";

/// Per-instrument technical analysis prompt
///
/// Placeholders: `symbol`, `currentPrice`, `rsi`, `macd`, `sma20`, `sma50`,
/// `bbUpper`, `bbMiddle`, `bbLower`, `priceAction`.
pub fn technical_analysis() -> PromptTemplate {
    PromptTemplate::new(TECHNICAL_ANALYSIS, TECHNICAL_ANALYSIS_SOURCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_technical_analysis_placeholders() {
        let template = technical_analysis();
        let names: Vec<&str> = template.placeholders().collect();
        assert_eq!(
            names,
            vec![
                "symbol",
                "currentPrice",
                "rsi",
                "macd",
                "sma20",
                "sma50",
                "bbUpper",
                "bbMiddle",
                "bbLower",
                "priceAction"
            ]
        );
    }

    #[test]
    fn test_technical_analysis_render() {
        let prompt = technical_analysis()
            .render(&json!({
                "symbol": "BTCUSDT",
                "currentPrice": "64250.10",
                "rsi": "71.32",
                "macd": { "histogram": 1.0 },
                "priceAction": "2024-05-01T00:00:00.000Z: O:1 H:2 L:0.5 C:1.5"
            }))
            .unwrap();

        assert!(prompt.contains("technical data for BTCUSDT:"));
        assert!(prompt.contains("Current Price: 64250.10\n"));
        assert!(prompt.contains(r#"MACD: {"histogram":1.0}"#));
        assert!(prompt.contains("(last 5 periods):\n2024-05-01T00:00:00.000Z: O:1"));
        // Values not supplied stay visible
        assert!(prompt.contains("SMA 20: {sma20}"));
        assert!(prompt.ends_with("supportLevel, resistanceLevel"));
    }
}
