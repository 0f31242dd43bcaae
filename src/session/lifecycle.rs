//! Session lifecycle
//!
//! Owns the one-time bootstrap of the agent session: open the tool
//! connections, construct the agent, bind the LLM, handshake and discover
//! tools. A failed bootstrap leaves nothing behind, so the next call starts
//! over from scratch.

use std::sync::Arc;

use tracing::{info, warn};

use crate::agent::AgentProxy;
use crate::core::{Config, PilotError, Result};
use crate::llm::{create_provider, LLMProvider};
use crate::session::result::TurnResult;
use crate::tools::{ServerPool, StdioConnector, ToolConnector};

/// Builds the LLM provider during bootstrap
pub type ProviderFactory = Arc<dyn Fn(&Config) -> Result<Arc<dyn LLMProvider>> + Send + Sync>;

/// A fully bootstrapped session
pub struct ReadySession {
    pool: Arc<ServerPool>,
    proxy: AgentProxy,
}

/// Where the session is in its lifecycle
pub enum SessionState {
    /// Nothing has been attempted yet
    Uninitialized,
    /// Connections, agent and LLM are bound
    Ready(ReadySession),
    /// The last bootstrap failed; the next call retries from scratch
    Failed { attempts: usize, cause: String },
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready(_) => "ready",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Owns the session state and drives bootstrap and turns
pub struct SessionManager {
    config: Config,
    connector: Arc<dyn ToolConnector>,
    provider_factory: ProviderFactory,
    state: SessionState,
    attempts: usize,
}

/// Builder for creating a SessionManager
pub struct SessionManagerBuilder {
    config: Config,
    connector: Option<Arc<dyn ToolConnector>>,
    provider_factory: Option<ProviderFactory>,
}

impl SessionManagerBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            connector: None,
            provider_factory: None,
        }
    }

    /// Set how tool servers are reached (default: child processes over stdio)
    pub fn connector(mut self, connector: Arc<dyn ToolConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Set how the LLM provider is created (default: from `config.llm`)
    pub fn provider_factory(mut self, factory: ProviderFactory) -> Self {
        self.provider_factory = Some(factory);
        self
    }

    /// Always hand out the same provider
    pub fn provider(self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider_factory(Arc::new(
            move |_: &Config| -> Result<Arc<dyn LLMProvider>> { Ok(provider.clone()) },
        ))
    }

    pub fn build(self) -> SessionManager {
        SessionManager {
            config: self.config,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(StdioConnector) as Arc<dyn ToolConnector>),
            provider_factory: self
                .provider_factory
                .unwrap_or_else(|| Arc::new(create_provider) as ProviderFactory),
            state: SessionState::Uninitialized,
            attempts: 0,
        }
    }
}

impl SessionManager {
    /// Manager with the default connector and provider
    pub fn new(config: Config) -> Self {
        SessionManagerBuilder::new(config).build()
    }

    pub fn builder(config: Config) -> SessionManagerBuilder {
        SessionManagerBuilder::new(config)
    }

    /// Bootstrap the session unless it is already ready.
    ///
    /// Idempotent once it has succeeded. Every failure is returned as
    /// `PilotError::Init` and the next call repeats the whole sequence.
    pub async fn ensure_ready(&mut self) -> Result<()> {
        self.ready().await.map(|_| ())
    }

    async fn ready(&mut self) -> Result<&mut ReadySession> {
        if !self.state.is_ready() {
            self.attempts += 1;
            info!(attempt = self.attempts, "Bootstrapping agent session");

            match self.bootstrap().await {
                Ok(ready) => {
                    info!(agent = %ready.proxy.name(), "Agent session ready");
                    self.state = SessionState::Ready(ready);
                }
                Err(e) => {
                    let e = e.into_init();
                    warn!(attempt = self.attempts, "Bootstrap failed: {}", e);
                    self.state = SessionState::Failed {
                        attempts: self.attempts,
                        cause: e.to_string(),
                    };
                    return Err(e);
                }
            }
        }

        match &mut self.state {
            SessionState::Ready(ready) => Ok(ready),
            _ => Err(PilotError::init("session is not ready")),
        }
    }

    async fn bootstrap(&self) -> Result<ReadySession> {
        self.config.validate()?;

        // 1. Acquire the tool connections
        let pool = Arc::new(
            ServerPool::open(
                self.connector.as_ref(),
                &self.config.agent.server_names,
                &self.config.servers,
            )
            .await?,
        );

        match self.bind_agent(pool.clone()).await {
            Ok(proxy) => Ok(ReadySession { pool, proxy }),
            Err(e) => {
                pool.close_all().await;
                Err(e)
            }
        }
    }

    async fn bind_agent(&self, pool: Arc<ServerPool>) -> Result<AgentProxy> {
        // 2. Construct the agent
        let mut proxy = AgentProxy::new(&self.config.agent, pool);

        // 3. Bind the LLM
        let provider = (self.provider_factory)(&self.config)?;
        proxy.attach_llm(provider, &self.config.llm.model);

        // 4. Handshake and tool discovery
        proxy.initialize().await?;

        // 5. Enumerate tools for observability
        let tools: Vec<&str> = proxy.list_tools()?.iter().map(|t| t.name()).collect();
        info!(agent = %proxy.name(), count = tools.len(), ?tools, "Tools available");

        Ok(proxy)
    }

    /// Make sure the session is ready, then run one turn.
    ///
    /// Never fails outright: every error comes back as a `TurnResult::Failure`.
    pub async fn run_turn(&mut self, command: &str) -> TurnResult {
        let timeout = self.config.turn_timeout();

        let ready = match self.ready().await {
            Ok(ready) => ready,
            Err(e) => return TurnResult::from_error(e),
        };

        let params = ready.proxy.params().clone();
        let turn = ready
            .proxy
            .invoke(command, params.use_history, params.max_tokens);

        let outcome = match timeout {
            // Dropping the turn future cancels any in-flight model or tool call
            Some(limit) => match tokio::time::timeout(limit, turn).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(limit_secs = limit.as_secs(), "Turn timed out");
                    Err(PilotError::Timeout(limit))
                }
            },
            None => turn.await,
        };

        TurnResult::from(outcome)
    }

    /// Close every tool connection
    pub async fn shutdown(self) {
        if let SessionState::Ready(ready) = self.state {
            ready.pool.close_all().await;
            info!("Agent session closed");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_ready()
    }

    /// Number of bootstrap sequences started so far
    pub fn bootstrap_attempts(&self) -> usize {
        self.attempts
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn proxy(&self) -> Option<&AgentProxy> {
        match &self.state {
            SessionState::Ready(ready) => Some(&ready.proxy),
            _ => None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
