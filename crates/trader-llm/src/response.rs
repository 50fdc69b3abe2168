//! Provider response shapes and their normalization to plain text
//!
//! Providers do not agree on a response shape. Each shape this crate knows
//! about is a variant of [`ProviderResponse`]; the shape is decided once,
//! when the raw value enters the crate, and [`ProviderResponse::into_text`]
//! turns any variant into the plain text handed to callers.
//!
//! Extraction priority, highest first:
//!
//! 1. a `generations` list: the first entry's `text`, else its
//!    `message.content`, else the whole first entry as JSON
//! 2. a bare string
//! 3. a direct `content` field
//! 4. a direct `text` field
//! 5. the JSON serialization of the entire value

use serde_json::Value;

/// One candidate completion
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    /// Plain completion text, when the provider supplies it
    pub text: Option<String>,

    /// Chat-style `message.content`, string or structured
    pub message_content: Option<Value>,

    /// The entry as received, used as the last-resort rendering
    pub raw: Value,
}

impl Generation {
    /// Generation carrying only text
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw: serde_json::json!({ "text": text }),
            text: Some(text),
            message_content: None,
        }
    }

    fn from_value(raw: Value) -> Self {
        let text = raw
            .get("text")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        let message_content = raw
            .get("message")
            .and_then(|message| message.get("content"))
            .filter(|content| is_present(content))
            .cloned();

        Self {
            text,
            message_content,
            raw,
        }
    }

    fn into_text(self) -> String {
        if let Some(text) = self.text {
            return text;
        }
        match self.message_content {
            Some(content) => value_to_text(content),
            None => self.raw.to_string(),
        }
    }
}

/// Response of a generative-text provider, classified by shape
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// Non-empty list of candidate generations
    Generations(Vec<Generation>),

    /// The provider answered with a bare string
    Text(String),

    /// Object with a direct `content` field
    Content(Value),

    /// Object with a direct `text` field
    DirectText(Value),

    /// Anything else
    Unknown(Value),
}

impl ProviderResponse {
    /// Classify a raw provider value
    pub fn from_value(raw: Value) -> Self {
        if let Some(generations) = raw.get("generations").and_then(Value::as_array) {
            if !generations.is_empty() {
                return Self::Generations(
                    generations.iter().cloned().map(Generation::from_value).collect(),
                );
            }
            return Self::Unknown(raw);
        }

        if let Value::String(text) = raw {
            return Self::Text(text);
        }

        if let Some(content) = raw.get("content").filter(|v| is_present(v)) {
            return Self::Content(content.clone());
        }

        if let Some(text) = raw.get("text").filter(|v| is_present(v)) {
            return Self::DirectText(text.clone());
        }

        Self::Unknown(raw)
    }

    /// Normalize to plain text
    pub fn into_text(self) -> String {
        match self {
            Self::Generations(generations) => generations
                .into_iter()
                .next()
                .map(Generation::into_text)
                .unwrap_or_default(),
            Self::Text(text) => text,
            Self::Content(content) | Self::DirectText(content) => value_to_text(content),
            Self::Unknown(raw) => raw.to_string(),
        }
    }

    /// Short label of the detected shape, for logging
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Generations(_) => "generations",
            Self::Text(_) => "text",
            Self::Content(_) => "content",
            Self::DirectText(_) => "direct_text",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<Value> for ProviderResponse {
    fn from(raw: Value) -> Self {
        Self::from_value(raw)
    }
}

/// Strings pass through; anything else is rendered as JSON
fn value_to_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Null, `false`, zero and the empty string count as absent
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
