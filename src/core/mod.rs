//! Core module - shared infrastructure for Webpilot
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the application.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentConfig, Config, LlmConfig, ProviderType, ServerConfig};
pub use error::{PilotError, Result};
pub use types::*;
