//! Tool registry - manages and dispatches tool calls
//!
//! Central hub mapping the tools discovered on every connected server to
//! the names the model sees, and routing the model's calls back.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::core::{PilotError, Result, ToolCall, ToolDefinition, ToolResult};
use crate::tools::mcp::{McpTool, ServerPool};

/// Where a namespaced tool lives
#[derive(Debug, Clone)]
struct ToolRoute {
    server: String,
    tool: String,
}

/// Registry of tools available to the agent
pub struct ToolRegistry {
    /// Connections the tools are served from
    pool: Arc<ServerPool>,
    /// Tool definitions, in discovery order
    definitions: Vec<ToolDefinition>,
    /// Namespaced name to owning server and server-local name
    routes: HashMap<String, ToolRoute>,
}

/// Name the model sees for `tool` on `server`
///
/// Function names are restricted to `[A-Za-z0-9_.-]` by the LLM backends,
/// so anything else becomes `_`.
pub fn namespaced_name(server: &str, tool: &str) -> String {
    format!("{}_{}", server, tool)
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl ToolRegistry {
    /// Create an empty registry over a pool
    pub fn new(pool: Arc<ServerPool>) -> Self {
        Self {
            pool,
            definitions: Vec::new(),
            routes: HashMap::new(),
        }
    }

    /// Ask every server in the pool for its tools and register them
    pub async fn discover(pool: Arc<ServerPool>) -> Result<Self> {
        let mut registry = Self::new(pool.clone());

        for connection in pool.connections() {
            let tools = connection.list_tools().await?;
            debug!(server = %connection.server_name(), count = tools.len(), "Tools discovered");
            for tool in tools {
                registry.register(connection.server_name(), tool);
            }
        }

        Ok(registry)
    }

    /// Register a tool served by `server`
    pub fn register(&mut self, server: &str, tool: McpTool) {
        let name = namespaced_name(server, &tool.name);
        let definition = ToolDefinition::function(
            name.clone(),
            tool.description.clone().unwrap_or_default(),
            tool.input_schema.clone(),
        );

        if self.routes.contains_key(&name) {
            self.definitions.retain(|d| d.name() != name);
        }

        self.definitions.push(definition);
        self.routes.insert(
            name,
            ToolRoute {
                server: server.to_string(),
                tool: tool.name,
            },
        );
    }

    /// Get all tool definitions
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Names the model can call
    pub fn tool_names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Execute a tool call
    ///
    /// Unknown tools are reported back to the model as a failed result;
    /// only a broken connection is an error.
    pub async fn execute(&self, tool_call: &ToolCall) -> Result<ToolResult> {
        let route = match self.routes.get(&tool_call.name) {
            Some(route) => route,
            None => {
                return Ok(ToolResult::failure(
                    &tool_call.name,
                    format!("Unknown tool: {}", tool_call.name),
                ))
            }
        };

        let connection = self.pool.get(&route.server).ok_or_else(|| {
            PilotError::tool_server(format!("server '{}' is not connected", route.server))
        })?;

        debug!(server = %route.server, tool = %route.tool, "Calling tool");

        let mut result = connection
            .call_tool(&route.tool, tool_call.arguments.clone())
            .await?;
        result.tool_name = tool_call.name.clone();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_pool() -> Arc<ServerPool> {
        Arc::new(ServerPool::from_connections(Vec::new()))
    }

    #[test]
    fn test_namespaced_name() {
        assert_eq!(
            namespaced_name("playwright", "browser_navigate"),
            "playwright_browser_navigate"
        );
        assert_eq!(namespaced_name("my server", "get/page"), "my_server_get_page");
    }

    #[test]
    fn test_register_keeps_order_and_replaces_duplicates() {
        let mut registry = ToolRegistry::new(empty_pool());
        registry.register("playwright", McpTool::new("browser_navigate", "Navigate"));
        registry.register("playwright", McpTool::new("browser_click", "Click"));
        registry.register("playwright", McpTool::new("browser_navigate", "Navigate again"));

        assert_eq!(
            registry.tool_names(),
            vec!["playwright_browser_click", "playwright_browser_navigate"]
        );
        assert_eq!(registry.definitions()[1].function.description, "Navigate again");
    }

    #[test]
    fn test_unknown_tool_is_a_failed_result() {
        let registry = ToolRegistry::new(empty_pool());
        let call = ToolCall::new("playwright_browser_fly", serde_json::json!({}));

        let result = tokio_test::block_on(registry.execute(&call)).unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Unknown tool"));
    }

    #[test]
    fn test_missing_connection_is_an_error() {
        let mut registry = ToolRegistry::new(empty_pool());
        registry.register("playwright", McpTool::new("browser_close", "Close"));
        let call = ToolCall::new("playwright_browser_close", serde_json::Value::Null);

        let err = tokio_test::block_on(registry.execute(&call)).unwrap_err();
        assert!(matches!(err, PilotError::ToolServer(_)));
    }
}
