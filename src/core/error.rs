//! Custom error types for Webpilot
//!
//! Provides a unified error handling system across all modules.

use std::time::Duration;

use thiserror::Error;

/// Main error type for Webpilot operations
#[derive(Error, Debug)]
pub enum PilotError {
    /// Session bootstrap failed (connection, proxy construction or LLM binding)
    #[error("{0}")]
    Init(String),

    /// The bound LLM or a tool call failed mid-turn
    #[error("{0}")]
    Generation(String),

    /// A turn is already executing
    #[error("a command is already running, wait for it to finish")]
    Busy,

    /// The turn did not finish within the configured bound
    #[error("turn timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Tool server process or transport errors
    #[error("Tool server error: {0}")]
    ToolServer(String),

    /// Malformed JSON-RPC traffic
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// LLM backend errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// No API key configured for the LLM backend
    #[error("No API key configured. Set GOOGLE_API_KEY or llm.api_key in the config file")]
    MissingApiKey,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Convenience Result type for Webpilot operations
pub type Result<T> = std::result::Result<T, PilotError>;

impl PilotError {
    /// Create a bootstrap error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a mid-turn generation error
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    /// Create a tool server error
    pub fn tool_server(msg: impl Into<String>) -> Self {
        Self::ToolServer(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error with additional context
    pub fn with_context<E>(context: impl Into<String>, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Fold any error raised during bootstrap into an `Init` error.
    pub fn into_init(self) -> Self {
        match self {
            Self::Init(_) => self,
            other => Self::Init(other.to_string()),
        }
    }

    /// Fold any error raised during a turn into a `Generation` error.
    pub fn into_generation(self) -> Self {
        match self {
            Self::Generation(_) | Self::Busy | Self::Timeout(_) | Self::Init(_) => self,
            other => Self::Generation(other.to_string()),
        }
    }
}
