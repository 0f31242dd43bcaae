//! Webpilot - natural-language browser agent
//!
//! Turns plain-language commands into tool calls against an MCP
//! browser-automation server, with an LLM deciding which tools to call.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: LLM provider abstraction with a Gemini implementation
//! - **Tools**: MCP tool server connections and the tool registry
//! - **Agent**: The agent proxy, its LLM binding and conversation history
//! - **Session**: One-time bootstrap and the synchronous turn bridge
//! - **CLI**: Command-line shell
//!
//! # Usage
//!
//! ```rust,no_run
//! use webpilot::{Config, SessionManager, TurnBridge};
//!
//! fn main() -> webpilot::Result<()> {
//!     let bridge = TurnBridge::start(SessionManager::new(Config::load()?))?;
//!
//!     let result = bridge.submit("Go to example.com and tell me the page title");
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod session;
pub mod tools;

// Re-export commonly used items
pub use agent::AgentProxy;
pub use cli::Repl;
pub use core::{Config, PilotError, Result};
pub use session::{SessionManager, TurnBridge, TurnResult};
