//! Agent client proxy
//!
//! One configured agent: identity, instruction, the tool servers it is bound
//! to and, once attached, its LLM. `invoke` runs a single conversational turn.

use std::sync::Arc;

use tracing::info;

use crate::agent::binding::{LlmBinding, RequestParams};
use crate::core::{AgentConfig, PilotError, Result, ToolDefinition};
use crate::llm::LLMProvider;
use crate::tools::{ServerPool, ToolRegistry};

/// A configured agent bound to a set of tool connections
pub struct AgentProxy {
    name: String,
    instruction: String,
    server_names: Vec<String>,
    pool: Arc<ServerPool>,
    registry: Option<ToolRegistry>,
    llm: Option<LlmBinding>,
    params: RequestParams,
    max_history: usize,
}

impl AgentProxy {
    /// Construct the agent over an open pool. Nothing is contacted yet.
    pub fn new(config: &AgentConfig, pool: Arc<ServerPool>) -> Self {
        Self {
            name: config.name.clone(),
            instruction: config.instruction.clone(),
            server_names: config.server_names.clone(),
            pool,
            registry: None,
            llm: None,
            params: RequestParams::from_config(config),
            max_history: config.max_history,
        }
    }

    /// Bind an LLM to this agent; the agent's instruction becomes its system prompt
    pub fn attach_llm(&mut self, provider: Arc<dyn LLMProvider>, model: &str) {
        info!(agent = %self.name, provider = provider.name(), model, "LLM attached");
        self.llm = Some(LlmBinding::new(
            provider,
            model,
            self.instruction.clone(),
            self.max_history,
        ));
    }

    /// Handshake with every bound server and discover its tools
    pub async fn initialize(&mut self) -> Result<()> {
        for name in &self.server_names {
            let connection = self.pool.get(name).ok_or_else(|| {
                PilotError::init(format!(
                    "agent '{}': server '{}' is not connected",
                    self.name, name
                ))
            })?;
            connection.initialize().await?;
        }

        self.registry = Some(ToolRegistry::discover(self.pool.clone()).await?);
        Ok(())
    }

    /// Tools discovered during `initialize`
    pub fn list_tools(&self) -> Result<&[ToolDefinition]> {
        self.registry
            .as_ref()
            .map(|r| r.definitions())
            .ok_or_else(|| PilotError::init(format!("agent '{}' is not initialized", self.name)))
    }

    /// Run one conversational turn
    pub async fn invoke(
        &mut self,
        message: &str,
        use_history: bool,
        max_tokens: u32,
    ) -> Result<String> {
        let params = RequestParams {
            use_history,
            max_tokens,
            ..self.params.clone()
        };
        self.invoke_with(message, &params).await
    }

    /// Run one conversational turn with explicit parameters
    pub async fn invoke_with(&mut self, message: &str, params: &RequestParams) -> Result<String> {
        let (llm, registry) = match (self.llm.as_mut(), self.registry.as_ref()) {
            (Some(llm), Some(registry)) => (llm, registry),
            (None, _) => {
                return Err(PilotError::generation(format!(
                    "agent '{}' has no LLM attached",
                    self.name
                )))
            }
            (_, None) => {
                return Err(PilotError::generation(format!(
                    "agent '{}' is not initialized",
                    self.name
                )))
            }
        };

        llm.generate_str(message, params, registry)
            .await
            .map_err(PilotError::into_generation)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_names(&self) -> &[String] {
        &self.server_names
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Parameters used by `run_turn`
    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    pub fn llm(&self) -> Option<&LlmBinding> {
        self.llm.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.is_some()
    }

    /// Number of messages held in the conversation history
    pub fn history_len(&self) -> usize {
        self.llm.as_ref().map(|l| l.conversation().len()).unwrap_or(0)
    }
}
