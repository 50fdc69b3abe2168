//! Agent gateway: the seam between the analysis pipeline and providers

use crate::{GenerationOptions, LLMError, LLMProvider, ProviderResponse, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Sends a prompt to the agent selected by `options.model`
///
/// Fails with [`LLMError::NotConfigured`] when nothing is registered for
/// the model. Callers get no retries from this layer.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions)
    -> Result<ProviderResponse>;
}

/// Agents keyed by model name
///
/// Built once at start-up and read-only afterwards.
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn LLMProvider>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` as the agent for `model`, replacing any previous one
    pub fn register(mut self, model: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        let model = model.into();
        info!(model = %model, provider = provider.name(), "Registered agent");
        self.agents.insert(model, provider);
        self
    }

    /// Register the agents whose credentials are present in the environment
    ///
    /// A Gemini agent for `model` is registered when `GOOGLE_API_KEY` is set.
    /// An empty registry is not an error: every call then fails with
    /// [`LLMError::NotConfigured`].
    #[cfg(feature = "gemini")]
    pub fn from_env(model: &str) -> Result<Self> {
        use crate::providers::{GeminiConfig, GeminiProvider};

        let registry = Self::new();
        match GeminiConfig::from_env()? {
            Some(config) => {
                let provider = GeminiProvider::with_config(config)?;
                Ok(registry.register(model, Arc::new(provider)))
            }
            None => {
                tracing::warn!("GOOGLE_API_KEY not set, no agents registered");
                Ok(registry)
            }
        }
    }

    /// Look up the agent for `model`
    pub fn get(&self, model: &str) -> Option<&Arc<dyn LLMProvider>> {
        self.agents.get(model)
    }

    /// Registered model names
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }

    /// Whether any agent is registered
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("models", &self.models())
            .finish()
    }
}

#[async_trait]
impl AgentGateway for AgentRegistry {
    #[instrument(skip(self, prompt, options), fields(model = %options.model))]
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<ProviderResponse> {
        let agent = self
            .get(&options.model)
            .ok_or_else(|| LLMError::NotConfigured(options.model.clone()))?;

        debug!(provider = agent.name(), prompt_len = prompt.len(), "Calling agent");
        let response = agent.generate(prompt, options).await?;
        debug!(shape = response.shape(), "Agent responded");
        Ok(response)
    }
}
