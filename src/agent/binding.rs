//! LLM binding
//!
//! Couples a provider and model with the agent's instruction and conversation
//! history, and runs the tool-calling loop for one turn.

use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::conversation::Conversation;
use crate::agent::loop_state::{AgentLoopState, Observation};
use crate::core::{AgentConfig, Message, Result};
use crate::llm::{GenerateOptions, LLMProvider};
use crate::tools::ToolRegistry;

const FINAL_ANSWER_PROMPT: &str = "You have reached the limit of tool calls for this request. \
Using only what has been gathered so far, give your final answer now.";

/// Per-turn generation parameters
#[derive(Debug, Clone)]
pub struct RequestParams {
    /// Prefix the request with earlier turns and record this one
    pub use_history: bool,
    /// Output token bound per model call
    pub max_tokens: u32,
    /// Model calls allowed before a final answer is forced
    pub max_iterations: usize,
    pub temperature: Option<f32>,
}

impl RequestParams {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            use_history: config.use_history,
            max_tokens: config.max_tokens,
            max_iterations: config.max_iterations,
            temperature: None,
        }
    }
}

impl Default for RequestParams {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// An LLM bound to an agent
pub struct LlmBinding {
    provider: Arc<dyn LLMProvider>,
    model: String,
    instruction: String,
    conversation: Conversation,
}

impl LlmBinding {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        model: impl Into<String>,
        instruction: impl Into<String>,
        max_history: usize,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            instruction: instruction.into(),
            conversation: Conversation::new(max_history),
        }
    }

    /// Run one turn and return the model's final text.
    ///
    /// The turn's messages are committed to history only once the turn has
    /// produced an answer; a failed or cancelled turn leaves history as it was.
    pub async fn generate_str(
        &mut self,
        message: &str,
        params: &RequestParams,
        tools: &ToolRegistry,
    ) -> Result<String> {
        let mut turn = vec![Message::user(message)];
        let mut state = AgentLoopState::new(params.max_iterations);
        let options = GenerateOptions {
            temperature: params.temperature,
            max_tokens: Some(params.max_tokens),
        };

        while state.should_continue() {
            let messages = self.request_messages(&turn, params.use_history);
            let response = self
                .provider
                .chat_with_tools(&self.model, &messages, tools.definitions(), Some(options.clone()))
                .await?;
            state.next_iteration();

            if response.tool_calls.is_empty() {
                turn.push(Message::assistant(response.content.clone()));
                state.final_answer = Some(response.content);
                break;
            }

            debug!(
                iteration = state.iteration,
                calls = response.tool_calls.len(),
                "Model requested tools"
            );

            let calls = response.tool_calls.clone();
            turn.push(Message::assistant_tool_calls(response.content, response.tool_calls));

            // Browser actions depend on page state, so calls run in order
            for call in &calls {
                let result = tools.execute(call).await?;
                state.observe(Observation::from(&result));
                turn.push(Message::tool(&result));
            }
        }

        if state.exhausted() {
            info!(
                iterations = state.iteration,
                "Tool-call limit reached, asking for a final answer"
            );
            let mut messages = self.request_messages(&turn, params.use_history);
            messages.push(Message::user(FINAL_ANSWER_PROMPT));

            let response = self
                .provider
                .chat(&self.model, &messages, Some(options))
                .await?;
            turn.push(Message::assistant(response.content.clone()));
            state.final_answer = Some(response.content);
        }

        info!(
            iterations = state.iteration,
            tool_calls = state.observations.len(),
            failed = state.failures(),
            "Turn complete"
        );

        if params.use_history {
            self.conversation.extend(turn);
        }

        Ok(state.final_answer.unwrap_or_default())
    }

    /// System instruction, optional history, then this turn so far
    fn request_messages(&self, turn: &[Message], use_history: bool) -> Vec<Message> {
        let mut messages = Vec::with_capacity(1 + self.conversation.len() + turn.len());
        messages.push(Message::system(self.instruction.clone()));
        if use_history {
            messages.extend(self.conversation.messages().cloned());
        }
        messages.extend(turn.iter().cloned());
        messages
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}
