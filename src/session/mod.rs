//! Session module - lifecycle and turn serialization
//!
//! The session bootstraps the agent exactly once and runs turns one at a
//! time on a single execution context.

pub mod bridge;
pub mod lifecycle;
pub mod result;

pub use bridge::TurnBridge;
pub use lifecycle::{
    ProviderFactory, ReadySession, SessionManager, SessionManagerBuilder, SessionState,
};
pub use result::{FailureKind, TurnFailure, TurnResult};
