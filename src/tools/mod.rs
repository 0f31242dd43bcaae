//! Tools module - tool servers and the registry the agent calls through
//!
//! Contains the MCP client and the tool registry.

pub mod mcp;
pub mod registry;

pub use mcp::{McpTool, ServerPool, StdioConnector, ToolConnection, ToolConnector};
pub use registry::ToolRegistry;
