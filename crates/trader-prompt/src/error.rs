//! Error types for prompt operations

use thiserror::Error;

/// Result type for prompt operations
pub type Result<T> = std::result::Result<T, PromptError>;

/// Errors that can occur during prompt operations
#[derive(Error, Debug)]
pub enum PromptError {
    /// Variables must be a JSON object keyed by placeholder name
    #[error("Template '{name}' expects an object of variables, got {kind}")]
    InvalidVariables { name: String, kind: &'static str },

    /// Variable serialization error
    #[error("Failed to serialize variables: {0}")]
    SerializationError(#[from] serde_json::Error),
}
