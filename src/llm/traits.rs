//! LLM Provider trait for abstracting different backends
//!
//! The agent only ever asks a backend for one thing: the next assistant
//! message given the conversation so far and the tools it may call.

use async_trait::async_trait;

use crate::core::{Message, Result, ToolCall, ToolDefinition};

/// Response from an LLM provider
#[derive(Debug, Clone, Default)]
pub struct LLMResponse {
    /// Text content of the response
    pub content: String,
    /// Any tool calls the model wants to make
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

impl LLMResponse {
    /// A plain text answer
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// A response that asks for tool calls
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Default::default()
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Options for LLM generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response with tool definitions
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    /// Generate a response without offering any tools
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.chat_with_tools(model, messages, &[], options).await
    }

    /// Get the provider name
    fn name(&self) -> &str;
}
