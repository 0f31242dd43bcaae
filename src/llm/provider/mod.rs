//! LLM Provider implementations and factory

pub mod gemini;

use std::sync::Arc;

use crate::core::config::{Config, ProviderType};
use crate::core::Result;
use crate::llm::traits::LLMProvider;

use self::gemini::GeminiProvider;

/// Create a new LLM provider based on configuration
pub fn create_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.llm.provider {
        ProviderType::Gemini => Arc::new(GeminiProvider::from_config(config)?),
    };
    Ok(provider)
}
