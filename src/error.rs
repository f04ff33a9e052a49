//! Error types for phone comparison runs

use thiserror::Error;

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AgentsError>;

/// Main error type
#[derive(Debug, Error)]
pub enum AgentsError {
    /// Error from the OpenAI-compatible API
    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    /// Maximum turns exceeded
    #[error("Maximum turns exceeded: {max_turns}")]
    MaxTurnsExceeded { max_turns: usize },

    /// Tool execution error
    #[error("Tool execution error: {message}")]
    ToolExecutionError { message: String },

    /// An external call did not finish within its time budget
    #[error("Operation '{operation}' timed out")]
    Timeout { operation: String },

    /// Model behavior error
    #[error("Model behavior error: {message}")]
    ModelBehaviorError { message: String },

    /// User error
    #[error("User error: {message}")]
    UserError { message: String },

    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Page fetch or search failure inside the browser agent
    #[error("Browser error: {0}")]
    BrowserError(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Config file parse error
    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
