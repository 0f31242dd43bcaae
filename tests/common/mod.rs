//! In-memory stand-ins for the tool server and the LLM backend

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use webpilot::core::{
    Config, Message, PilotError, Result, ServerConfig, ToolCall, ToolDefinition, ToolResult,
};
use webpilot::llm::{GenerateOptions, LLMProvider, LLMResponse};
use webpilot::session::SessionManager;
use webpilot::tools::{McpTool, ToolConnection, ToolConnector};

pub const SERVER: &str = "browser";

/// Config bound to a single mock server, without a turn timeout
pub fn test_config() -> Config {
    let mut config = Config::new();
    config.servers.clear();
    config
        .servers
        .insert(SERVER.to_string(), ServerConfig::new("mock-browser", &[]));
    config.agent.server_names = vec![SERVER.to_string()];
    config.agent.turn_timeout_secs = None;
    config.llm.api_key = Some("test-key".to_string());
    config
}

// ─── Tool server ─────────────────────────────────────────────────────────────

/// What happened on the mock tool server side
#[derive(Default)]
pub struct ServerLog {
    pub connects: AtomicUsize,
    pub initializes: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub closes: AtomicUsize,
    pub tool_calls: Mutex<Vec<(String, Value)>>,
    /// Events in order: "connect", "initialize", "list_tools", "call:<tool>", "close"
    pub events: Mutex<Vec<String>>,
}

impl ServerLog {
    fn event(&self, name: impl Into<String>) {
        self.events.lock().unwrap().push(name.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

pub struct MockConnector {
    pub log: Arc<ServerLog>,
    /// Number of upcoming connect attempts that fail
    pub failures_left: AtomicUsize,
    /// Fail the handshake instead of the connect
    pub fail_initialize: bool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            log: Arc::new(ServerLog::default()),
            failures_left: AtomicUsize::new(0),
            fail_initialize: false,
        }
    }

    pub fn failing(times: usize) -> Self {
        let connector = Self::new();
        connector.failures_left.store(times, Ordering::SeqCst);
        connector
    }
}

#[async_trait]
impl ToolConnector for MockConnector {
    async fn connect(
        &self,
        server_name: &str,
        _config: &ServerConfig,
    ) -> Result<Box<dyn ToolConnection>> {
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        self.log.event("connect");

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PilotError::tool_server("connection refused"));
        }

        Ok(Box::new(MockConnection {
            name: server_name.to_string(),
            log: self.log.clone(),
            fail_initialize: self.fail_initialize,
        }))
    }
}

pub struct MockConnection {
    name: String,
    log: Arc<ServerLog>,
    fail_initialize: bool,
}

#[async_trait]
impl ToolConnection for MockConnection {
    fn server_name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> Result<()> {
        self.log.initializes.fetch_add(1, Ordering::SeqCst);
        self.log.event("initialize");
        if self.fail_initialize {
            return Err(PilotError::protocol("handshake rejected"));
        }
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>> {
        self.log.list_calls.fetch_add(1, Ordering::SeqCst);
        self.log.event("list_tools");
        Ok(vec![
            McpTool::new("navigate", "Navigate to a URL"),
            McpTool::new("snapshot", "Capture an accessibility snapshot of the page"),
        ])
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult> {
        self.log.event(format!("call:{}", name));
        self.log
            .tool_calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        Ok(ToolResult::success(name, format!("{} done", name)))
    }

    async fn close(&self) -> Result<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        self.log.event("close");
        Ok(())
    }
}

// ─── LLM backend ─────────────────────────────────────────────────────────────

/// One scripted model reply
pub enum Reply {
    Text(String),
    Tools(Vec<ToolCall>),
    Fail(String),
    Slow(Duration, Box<Reply>),
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }

    pub fn tool(name: &str, arguments: Value) -> Self {
        Reply::Tools(vec![ToolCall::new(name, arguments)])
    }
}

/// Replays a script; once it runs out, echoes the latest user message
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Reply>>,
    /// Messages seen by each call, in order
    pub requests: Mutex<Vec<Vec<Message>>>,
    /// Tool names offered on each call
    pub offered_tools: Mutex<Vec<Vec<String>>>,
    pub options: Mutex<Vec<GenerateOptions>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    /// Signalled when a call starts, if set
    entered: Mutex<Option<mpsc::Sender<()>>>,
    /// When set, every call waits for a permit before replying
    gate: Option<Semaphore>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    pub fn echo() -> Self {
        Self::new(Vec::new())
    }

    /// A provider whose calls block until `release` is called
    pub fn gated() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        let provider = Self {
            entered: Mutex::new(Some(tx)),
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        };
        (provider, rx)
    }

    pub fn release(&self, calls: usize) {
        if let Some(ref gate) = self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Vec<Message> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

async fn play(mut reply: Reply) -> Result<LLMResponse> {
    loop {
        match reply {
            Reply::Text(text) => return Ok(LLMResponse::text(text)),
            Reply::Tools(calls) => return Ok(LLMResponse::with_tool_calls(calls)),
            Reply::Fail(msg) => return Err(PilotError::llm(msg)),
            Reply::Slow(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
            }
        }
    }
}

/// Content of the user-role messages, in order
pub fn user_contents(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.role == "user")
        .map(|m| m.content.clone())
        .collect()
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_with_tools(
        &self,
        _model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        self.requests.lock().unwrap().push(messages.to_vec());
        self.offered_tools
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name().to_string()).collect());
        self.options.lock().unwrap().push(options.unwrap_or_default());

        if let Some(tx) = self.entered.lock().unwrap().as_ref() {
            let _ = tx.send(());
        }

        if let Some(ref gate) = self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let next = self.script.lock().unwrap().pop_front();
        let reply = next.unwrap_or_else(|| {
            let last = user_contents(messages).pop().unwrap_or_default();
            Reply::Text(format!("echo: {}", last))
        });
        let outcome = play(reply).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Session manager over the mocks, counting provider bindings
pub fn manager_with(
    config: Config,
    connector: Arc<MockConnector>,
    provider: Arc<ScriptedProvider>,
    bindings: Arc<AtomicUsize>,
) -> SessionManager {
    SessionManager::builder(config)
        .connector(connector)
        .provider_factory(Arc::new(move |_: &Config| -> Result<Arc<dyn LLMProvider>> {
            bindings.fetch_add(1, Ordering::SeqCst);
            Ok(provider.clone() as Arc<dyn LLMProvider>)
        }))
        .build()
}
