//! Webpilot - natural-language browser agent
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use webpilot::{Config, Repl, SessionManager, TurnBridge};

/// Webpilot - drive a browser with plain-language commands
#[derive(Parser, Debug)]
#[command(name = "webpilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: ~/.config/webpilot/config.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Model to bind
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Turn timeout in seconds (0 waits forever)
    #[arg(long, short = 't')]
    timeout: Option<u64>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Single command mode (non-interactive)
    #[arg(long, short = 'p')]
    prompt: Option<String>,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    save_config: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.llm.model = model;
    }

    if let Some(timeout) = args.timeout {
        config.agent.turn_timeout_secs = Some(timeout);
    }

    if args.debug {
        config.agent.debug = true;
    }

    if args.save_config {
        // Keys stay in the environment
        let mut saved = config.clone();
        saved.llm.api_key = None;
        let path = saved.save()?;
        println!("Configuration written to {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    init_tracing(config.agent.debug);

    let bridge = TurnBridge::start(SessionManager::new(config.clone()))?;

    // Single command mode
    if let Some(prompt) = args.prompt {
        let result = bridge.submit(&prompt);
        println!("{}", result);
        return Ok(if result.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    // Interactive shell mode
    let mut repl = Repl::new(bridge, config);
    repl.run()?;

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
