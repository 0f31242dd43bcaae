//! Agent module - the agent proxy and its LLM binding
//!
//! Contains the agent that turns a user command into model calls and tool calls.

pub mod binding;
pub mod conversation;
pub mod loop_state;
pub mod proxy;

pub use binding::{LlmBinding, RequestParams};
pub use conversation::Conversation;
pub use loop_state::{AgentLoopState, Observation};
pub use proxy::AgentProxy;
