//! LLM module - Language Model integrations
//!
//! Provides the backend abstraction and the Gemini implementation.

pub mod provider;
pub mod traits;

pub use provider::create_provider;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
