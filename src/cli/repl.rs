//! Interactive shell for Webpilot
//!
//! Provides the main user interaction loop. Each submission blocks until
//! the agent has finished the turn.

use std::io::{self, BufRead, Write};

use crate::cli::commands::{handle_command, CommandResult};
use crate::core::{Config, Result};
use crate::session::TurnBridge;

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    bridge: TurnBridge,
    config: Config,
}

impl Repl {
    /// Create a shell over a running bridge
    pub fn new(bridge: TurnBridge, config: Config) -> Self {
        Self { bridge, config }
    }

    /// Run the shell until EOF or `exit`
    pub fn run(&mut self) -> Result<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("You: ");
            stdout.flush()?;

            let mut input = String::new();
            match stdin.lock().read_line(&mut input) {
                Ok(0) => {
                    // EOF (Ctrl+D)
                    println!("\nGoodbye!");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    continue;
                }
            }

            match handle_command(&input, &self.bridge, &self.config) {
                CommandResult::Exit => {
                    println!("\nGoodbye!");
                    break;
                }
                CommandResult::Handled(output) => println!("{}\n", output),
                CommandResult::None => continue,
                CommandResult::Submit(command) => {
                    println!("Processing your request...");
                    let result = self.bridge.submit(&command);
                    println!("\nResponse:\n{}\n", result);
                }
            }
        }

        self.bridge.shutdown();
        Ok(())
    }

    /// Print the startup banner
    fn print_banner(&self) {
        println!();
        println!("🌐 Webpilot - browser agent");
        println!("Interact with a web browsing agent that can navigate and interact with websites.");
        println!();
        println!("Model:    {}", self.config.llm.model);
        println!("Servers:  {}", self.config.agent.server_names.join(", "));
        println!();
        println!("Commands: help, last, status, exit");
        println!("───────────────────────────────────────────────────────────");
    }
}
