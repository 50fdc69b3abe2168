//! Google Gemini provider
//!
//! Talks to the `generateContent` endpoint of the Generative Language API.
//! See: https://ai.google.dev/api/generate-content

use crate::{
    Generation, GenerationOptions, LLMError, LLMProvider, ProviderResponse, Result,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use trader_utils::{env_parse, env_string};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection settings for [`GeminiProvider`]
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Settings for `api_key` against the public endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: GEMINI_API_BASE.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Read `GOOGLE_API_KEY`, `GEMINI_API_BASE` and `GEMINI_TIMEOUT_SECS`
    ///
    /// Returns `Ok(None)` when no API key is set.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(api_key) = env_string("GOOGLE_API_KEY") else {
            return Ok(None);
        };

        let mut config = Self::new(api_key);
        if let Some(base) = env_string("GEMINI_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(secs) = env_parse::<u64>("GEMINI_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(Some(config))
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a provider for `api_key` with default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    /// Create a provider from explicit settings
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LLMError::ConfigurationError(
                "Gemini API key must not be empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.config.api_base)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    #[instrument(skip(self, prompt, options), fields(model = %options.model))]
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<ProviderResponse> {
        debug!("Sending request to Gemini API");

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: options.max_tokens,
                temperature: options.temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint(&options.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LLMError::Timeout(format!("Gemini did not answer within {:?}", self.config.timeout))
                } else {
                    LLMError::HttpError(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 | 403 => LLMError::AuthenticationFailed,
                429 => LLMError::RateLimitExceeded(error_text),
                400 => LLMError::InvalidRequest(error_text),
                404 => LLMError::ModelNotFound(options.model.clone()),
                500..=599 => LLMError::ProviderError(format!("HTTP {status}: {error_text}")),
                _ => LLMError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let response = parse_response(body);
        debug!(shape = response.shape(), "Received Gemini response");
        Ok(response)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Map `candidates` onto generations, keeping the raw body otherwise
fn parse_response(body: Value) -> ProviderResponse {
    let generations: Vec<Generation> = body
        .get("candidates")
        .and_then(Value::as_array)
        .map(|candidates| candidates.iter().map(candidate_to_generation).collect())
        .unwrap_or_default();

    if generations.is_empty() {
        return ProviderResponse::from_value(body);
    }
    ProviderResponse::Generations(generations)
}

fn candidate_to_generation(candidate: &Value) -> Generation {
    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    Generation {
        text: (!text.is_empty()).then_some(text),
        message_content: None,
        raw: candidate.clone(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}
