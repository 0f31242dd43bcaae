//! MCP client over a child process's stdin/stdout
//!
//! Messages are newline-delimited JSON-RPC 2.0. A background task reads
//! stdout, hands each response to the request waiting on its id, and answers
//! requests the server sends us (`ping`).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};

use super::{McpTool, ToolConnection, ToolConnector, PROTOCOL_VERSION};
use crate::core::{PilotError, Result, ServerConfig, ToolResult};

// ─── JSON-RPC types ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// Anything the server writes: a response to us, or its own request/notification
#[derive(Debug, Deserialize)]
struct JsonRpcMessage {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType", default)]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    fn render(&self) -> String {
        match self {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::Image { mime_type } => format!("[image: {}]", mime_type),
            ContentBlock::Resource { resource } => match resource.get("text") {
                Some(Value::String(text)) => text.clone(),
                _ => format!(
                    "[resource: {}]",
                    resource.get("uri").and_then(|u| u.as_str()).unwrap_or("?")
                ),
            },
            ContentBlock::Unknown => "[unsupported content]".to_string(),
        }
    }
}

fn render_content(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(ContentBlock::render)
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── Stdio connection ────────────────────────────────────────────────────────

type Waiters = HashMap<u64, oneshot::Sender<Result<Value>>>;
type PendingMap = Arc<StdMutex<Waiters>>;
type SharedStdin = Arc<Mutex<ChildStdin>>;

fn lock_pending(pending: &PendingMap) -> MutexGuard<'_, Waiters> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Forgets a request's waiter once the caller stops waiting for it
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock_pending(self.pending).remove(&self.id);
    }
}

async fn write_line(stdin: &Mutex<ChildStdin>, message: &impl Serialize) -> Result<()> {
    let line = serde_json::to_string(message)?;
    let mut stdin = stdin.lock().await;
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}

/// MCP server running as a child process, spoken to over stdin/stdout
pub struct StdioConnection {
    server_name: String,
    stdin: SharedStdin,
    next_id: AtomicU64,
    pending: PendingMap,
    child: Mutex<Child>,
}

impl StdioConnection {
    /// Launch the server process. The handshake happens in `initialize`.
    pub fn spawn(server_name: &str, config: &ServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = config.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            PilotError::tool_server(format!(
                "{}: failed to spawn '{}': {}",
                server_name, config.command, e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PilotError::tool_server(format!("{}: no stdin", server_name)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PilotError::tool_server(format!("{}: no stdout", server_name)))?;

        let stdin: SharedStdin = Arc::new(Mutex::new(stdin));
        let pending: PendingMap = Arc::new(StdMutex::new(HashMap::new()));
        tokio::spawn(Self::reader_task(
            stdout,
            stdin.clone(),
            pending.clone(),
            server_name.to_string(),
        ));

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(Self::stderr_task(stderr, server_name.to_string()));
        }

        info!(server = %server_name, command = %config.command, "Tool server launched");

        Ok(Self {
            server_name: server_name.to_string(),
            stdin,
            next_id: AtomicU64::new(1),
            pending,
            child: Mutex::new(child),
        })
    }

    /// Send a JSON-RPC request and wait for the response.
    ///
    /// If the returned future is dropped first, the waiter is removed.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        debug!(server = %self.server_name, id, method, "MCP → request");

        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: Some(id),
            method,
            params,
        };

        if let Err(e) = write_line(&self.stdin, &request).await {
            return Err(PilotError::tool_server(format!(
                "{}: write failed: {}",
                self.server_name, e
            )));
        }

        rx.await.map_err(|_| {
            PilotError::tool_server(format!("{}: server closed the connection", self.server_name))
        })?
    }

    /// Send a notification (no response expected)
    async fn notify(&self, method: &str) -> Result<()> {
        write_line(
            &self.stdin,
            &JsonRpcRequest {
                jsonrpc: "2.0",
                id: None,
                method,
                params: None,
            },
        )
        .await
    }

    /// Route responses from stdout to waiting callers
    async fn reader_task(
        stdout: ChildStdout,
        stdin: SharedStdin,
        pending: PendingMap,
        server_name: String,
    ) {
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) if !line.trim().is_empty() => {
                    debug!(server = %server_name, "MCP ← {}", truncate(&line, 200));
                    match serde_json::from_str::<JsonRpcMessage>(&line) {
                        Ok(message) => {
                            Self::dispatch(message, &stdin, &pending, &server_name).await;
                        }
                        Err(e) => {
                            warn!(server = %server_name, "MCP: unparseable message: {}", e);
                        }
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(server = %server_name, "MCP: stdout closed");
                    break;
                }
                Err(e) => {
                    error!(server = %server_name, "MCP: read error: {}", e);
                    break;
                }
            }
        }

        // Dropping the senders fails every outstanding request
        lock_pending(&pending).clear();
    }

    async fn dispatch(
        message: JsonRpcMessage,
        stdin: &Mutex<ChildStdin>,
        pending: &PendingMap,
        server_name: &str,
    ) {
        match (message.method, message.id) {
            // Request from the server
            (Some(method), Some(id)) => {
                let reply = if method == "ping" {
                    serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": {} })
                } else {
                    debug!(server = %server_name, %method, "MCP: unsupported server request");
                    serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {
                            "code": -32601,
                            "message": format!("Method not found: {}", method)
                        }
                    })
                };
                if let Err(e) = write_line(stdin, &reply).await {
                    warn!(server = %server_name, "MCP: failed to answer {}: {}", method, e);
                }
            }
            (Some(method), None) => {
                debug!(server = %server_name, %method, "MCP: notification");
            }
            (None, Some(id)) => {
                let waiter = id.as_u64().and_then(|id| lock_pending(pending).remove(&id));
                let Some(tx) = waiter else {
                    debug!(server = %server_name, %id, "MCP: response nobody is waiting for");
                    return;
                };
                let payload = match message.error {
                    Some(err) => Err(PilotError::protocol(format!(
                        "JSON-RPC error {}: {}",
                        err.code, err.message
                    ))),
                    None => Ok(message.result.unwrap_or(Value::Null)),
                };
                // The caller may have given up (timeout)
                let _ = tx.send(payload);
            }
            (None, None) => {
                warn!(server = %server_name, "MCP: message with neither id nor method");
            }
        }
    }

    async fn stderr_task(stderr: ChildStderr, server_name: String) {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(server = %server_name, "stderr: {}", line);
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl ToolConnection for StdioConnection {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn initialize(&self) -> Result<()> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = self.request("initialize", Some(params)).await?;
        debug!(server = %self.server_name, ?result, "MCP initialized");

        self.notify("notifications/initialized").await?;
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({ "cursor": c }));
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                PilotError::protocol(format!("{}: bad tools/list reply: {}", self.server_name, e))
            })?;

            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let params = serde_json::json!({ "name": name, "arguments": arguments });

        let result = match self.request("tools/call", Some(params)).await {
            Ok(value) => value,
            // The server rejected the call itself; let the model see why
            Err(PilotError::Protocol(msg)) => return Ok(ToolResult::failure(name, msg)),
            Err(e) => return Err(e),
        };

        let parsed: CallToolResult = serde_json::from_value(result).map_err(|e| {
            PilotError::protocol(format!("{}: bad tools/call reply: {}", self.server_name, e))
        })?;
        let output = render_content(&parsed.content);

        if parsed.is_error {
            Ok(ToolResult::failure(name, output))
        } else {
            Ok(ToolResult::success(name, output))
        }
    }

    async fn close(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        if let Ok(None) = child.try_wait() {
            child.kill().await?;
        }
        info!(server = %self.server_name, "Tool server closed");
        Ok(())
    }
}

/// Connector that launches each declared server as a child process
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioConnector;

#[async_trait]
impl ToolConnector for StdioConnector {
    async fn connect(
        &self,
        server_name: &str,
        config: &ServerConfig,
    ) -> Result<Box<dyn ToolConnection>> {
        Ok(Box::new(StdioConnection::spawn(server_name, config)?))
    }
}
