//! CLI module - command-line shell
//!
//! Contains the REPL and command parsing.

pub mod commands;
pub mod repl;

pub use repl::Repl;
