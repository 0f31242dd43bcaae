//! Shell commands
//!
//! Words the shell handles itself instead of sending to the agent.

use crate::core::Config;
use crate::session::TurnBridge;

/// Example commands shown by `help`
pub const EXAMPLE_COMMANDS: &[(&str, &str)] = &[
    ("Navigation", "Go to github.com/priyank766 and rate the main page"),
    ("Extraction", "Open news.ycombinator.com and list the top 5 stories"),
    ("Interaction", "Search wikipedia for Rust and summarise the first paragraph"),
];

/// Result of parsing a command
#[derive(Debug, PartialEq, Eq)]
pub enum CommandResult {
    /// Send the input to the agent
    Submit(String),
    /// Command was handled, show output
    Handled(String),
    /// Exit the shell
    Exit,
    /// No output needed
    None,
}

/// Parse and handle shell commands
pub fn handle_command(input: &str, bridge: &TurnBridge, config: &Config) -> CommandResult {
    let input = input.trim();
    if input.is_empty() {
        return CommandResult::None;
    }

    match input.to_lowercase().as_str() {
        "exit" | "quit" | "q" => CommandResult::Exit,

        "help" | "?" => CommandResult::Handled(help_text()),

        // Re-render without submitting anything
        "last" => match bridge.last_result() {
            Some(result) => CommandResult::Handled(result.display_text()),
            None => CommandResult::Handled("No response yet.".to_string()),
        },

        "status" => CommandResult::Handled(status_text(bridge, config)),

        _ => CommandResult::Submit(input.to_string()),
    }
}

fn status_text(bridge: &TurnBridge, config: &Config) -> String {
    format!(
        "Webpilot Status:\n\
         ─────────────────────────────\n\
         Agent:    {}\n\
         Model:    {}\n\
         Servers:  {}\n\
         History:  {}\n\
         Timeout:  {}\n\
         Busy:     {}",
        config.agent.name,
        config.llm.model,
        config.agent.server_names.join(", "),
        if config.agent.use_history { "on" } else { "off" },
        config
            .turn_timeout()
            .map(|t| format!("{}s", t.as_secs()))
            .unwrap_or_else(|| "none".to_string()),
        if bridge.is_busy() { "yes" } else { "no" },
    )
}

/// Generate help text
pub fn help_text() -> String {
    let mut text = String::from(
        "Type a browsing command and press Enter; the agent drives a real browser.\n\n\
         Commands:\n  \
         help, ?     Show this help\n  \
         last        Show the most recent response again\n  \
         status      Show the agent configuration\n  \
         exit, quit  Leave\n\n\
         Example commands:",
    );

    for (category, example) in EXAMPLE_COMMANDS {
        text.push_str(&format!("\n  {:<12} {}", category, example));
    }

    text
}
