//! The stdio MCP client against scripted `sh` servers
//!
//! Each server records every line it receives in `$LOG` so the tests can
//! check what went over the wire.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use webpilot::core::{PilotError, ServerConfig};
use webpilot::tools::mcp::StdioConnection;
use webpilot::tools::ToolConnection;

const HELPERS: &str = r#"
recv() { IFS= read -r line || exit 0; printf '%s\n' "$line" >> "$LOG"; }
send() { printf '%s\n' "$1"; }
"#;

/// Answers `initialize` and swallows the `initialized` notification
const HANDSHAKE: &str = r#"
recv
send '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake","version":"0.0.0"}}}'
recv
"#;

struct FakeServer {
    connection: StdioConnection,
    dir: TempDir,
}

impl FakeServer {
    /// Launch a server running the handshake followed by `body`
    async fn start(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = format!("{}{}{}", HELPERS, HANDSHAKE, body);
        let mut config = ServerConfig::new("sh", &["-c", script.as_str()]);
        config
            .env
            .insert("LOG".to_string(), log_path(&dir).display().to_string());

        let connection = StdioConnection::spawn("fake", &config).unwrap();
        connection.initialize().await.unwrap();
        Self { connection, dir }
    }

    /// Every message the server has read so far
    fn received(&self) -> Vec<Value> {
        std::fs::read_to_string(log_path(&self.dir))
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

fn log_path(dir: &TempDir) -> PathBuf {
    dir.path().join("received.jsonl")
}

#[tokio::test]
async fn test_handshake_and_paged_tool_list() {
    let server = FakeServer::start(
        r#"
recv
send '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"browser_navigate","description":"Navigate","inputSchema":{"type":"object"}}],"nextCursor":"p2"}}'
recv
send '{"jsonrpc":"2.0","id":3,"result":{"tools":[{"name":"browser_snapshot","description":"Snapshot"}]}}'
"#,
    )
    .await;

    let tools = server.connection.list_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["browser_navigate", "browser_snapshot"]);

    let received = server.received();
    assert_eq!(received.len(), 4);

    assert_eq!(received[0]["method"], "initialize");
    assert_eq!(received[0]["id"], 1);
    assert_eq!(received[0]["params"]["protocolVersion"], "2024-11-05");

    assert_eq!(received[1]["method"], "notifications/initialized");
    assert!(received[1].get("id").is_none());

    assert_eq!(received[2]["method"], "tools/list");
    assert_eq!(received[2]["id"], 2);
    assert!(received[2].get("params").is_none());

    assert_eq!(received[3]["id"], 3);
    assert_eq!(received[3]["params"], json!({ "cursor": "p2" }));
}

#[tokio::test]
async fn test_tool_errors_become_failed_results() {
    let server = FakeServer::start(
        r#"
recv
send '{"jsonrpc":"2.0","id":2,"error":{"code":-32602,"message":"Unknown tool: teleport"}}'
recv
send '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"Timeout waiting for selector"}],"isError":true}}'
recv
send '{"jsonrpc":"2.0","id":4,"result":{"content":[{"type":"text","text":"Example Domain"}]}}'
"#,
    )
    .await;
    let conn = &server.connection;

    let rejected = conn.call_tool("teleport", json!({})).await.unwrap();
    assert!(!rejected.success);
    assert!(rejected.output.contains("Unknown tool: teleport"));

    let failed = conn.call_tool("click", json!({ "ref": "e1" })).await.unwrap();
    assert!(!failed.success);
    assert_eq!(failed.output, "Timeout waiting for selector");

    let ok = conn.call_tool("snapshot", Value::Null).await.unwrap();
    assert!(ok.success);
    assert_eq!(ok.output, "Example Domain");

    let received = server.received();
    assert_eq!(received[3]["method"], "tools/call");
    assert_eq!(received[3]["params"]["name"], "click");
    assert_eq!(received[3]["params"]["arguments"], json!({ "ref": "e1" }));
    // A null argument list goes out as an empty object
    assert_eq!(received[4]["params"]["arguments"], json!({}));
}

#[tokio::test]
async fn test_server_requests_are_answered() {
    // The server pings with the same id as our pending request before replying
    let server = FakeServer::start(
        r#"
recv
send '{"jsonrpc":"2.0","id":2,"method":"ping"}'
recv
send '{"jsonrpc":"2.0","id":"srv-1","method":"sampling/createMessage","params":{}}'
recv
send '{"jsonrpc":"2.0","method":"notifications/tools/list_changed"}'
send '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"browser_navigate"}]}}'
"#,
    )
    .await;

    let tools = server.connection.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "browser_navigate");

    let received = server.received();
    let pong = &received[3];
    assert_eq!(pong["id"], 2);
    assert_eq!(pong["result"], json!({}));
    assert!(pong.get("method").is_none());

    let refusal = &received[4];
    assert_eq!(refusal["id"], "srv-1");
    assert_eq!(refusal["error"]["code"], -32601);
}

#[tokio::test]
async fn test_closed_stdout_fails_pending_request() {
    let server = FakeServer::start("recv\nexit 0\n").await;

    let outcome = tokio::time::timeout(Duration::from_secs(10), server.connection.list_tools())
        .await
        .expect("request should fail once stdout closes");

    match outcome {
        Err(PilotError::ToolServer(msg)) => assert!(msg.contains("closed"), "{}", msg),
        other => panic!("expected a tool server error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_close_stops_the_server() {
    let server = FakeServer::start("exec sleep 30\n").await;

    server.connection.close().await.unwrap();
    // Closing twice is harmless
    server.connection.close().await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), server.connection.list_tools())
        .await
        .expect("a stopped server should not leave requests hanging");
    assert!(matches!(outcome, Err(PilotError::ToolServer(_))));
}
