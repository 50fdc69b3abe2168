//! Generative-text gateway for market analysis
//!
//! This crate hides the generative-text provider behind a narrow seam:
//!
//! - [`GenerationOptions`] selects the model and sampling parameters
//! - [`LLMProvider`] is one backing agent (e.g. Gemini)
//! - [`AgentGateway`] is what callers depend on; [`AgentRegistry`] routes a
//!   request to the provider registered for its model
//! - [`ProviderResponse`] resolves the provider's response shape once and
//!   normalizes it to plain text

pub mod error;
pub mod gateway;
pub mod options;
pub mod provider;
pub mod response;

pub use error::{LLMError, Result};
pub use gateway::{AgentGateway, AgentRegistry};
pub use options::{DEFAULT_MODEL, GenerationOptions};
pub use provider::LLMProvider;
pub use response::{Generation, ProviderResponse};

// Provider implementations (feature-gated)
#[cfg(feature = "gemini")]
pub mod providers;
