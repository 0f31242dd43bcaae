//! MCP tool server connections
//!
//! A tool server is an external process speaking the Model Context Protocol.
//! The agent only needs three things from it: a handshake, the list of tools,
//! and a way to call one of them.

mod client;
mod pool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Result, ServerConfig, ToolResult};

pub use client::{StdioConnection, StdioConnector};
pub use pool::ServerPool;

/// MCP protocol revision sent during the handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A tool advertised by an MCP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl McpTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: empty_schema(),
        }
    }
}

/// A live connection to one tool server
#[async_trait]
pub trait ToolConnection: Send + Sync {
    /// Name the server was declared under
    fn server_name(&self) -> &str;

    /// Perform the protocol handshake
    async fn initialize(&self) -> Result<()>;

    /// Enumerate the tools the server offers
    async fn list_tools(&self) -> Result<Vec<McpTool>>;

    /// Invoke a tool by its server-local name
    ///
    /// Tool-level failures come back as an unsuccessful `ToolResult`;
    /// `Err` means the connection itself is broken.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult>;

    /// Shut the server down
    async fn close(&self) -> Result<()>;
}

/// Opens connections to declared tool servers
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(
        &self,
        server_name: &str,
        config: &ServerConfig,
    ) -> Result<Box<dyn ToolConnection>>;
}
