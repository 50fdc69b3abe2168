//! LLM provider trait definition

use crate::{GenerationOptions, ProviderResponse, Result};
use async_trait::async_trait;

/// One backing agent able to answer a prompt
///
/// Implementations resolve their wire format into a [`ProviderResponse`]
/// so callers never inspect provider-specific JSON.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response for a single user prompt
    async fn generate(&self, prompt: &str, options: &GenerationOptions)
    -> Result<ProviderResponse>;

    /// Get the provider name (e.g., "gemini")
    fn name(&self) -> &str;
}
