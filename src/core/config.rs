//! Configuration management for Webpilot
//!
//! Supports environment variables, config files, and runtime overrides.
//!
//! Config file location: ~/.config/webpilot/config.toml

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{PilotError, Result};

const DEFAULT_INSTRUCTION: &str = "You are a helpful web browsing assistant that can interact with websites using playwright.
- Navigate to websites and perform browser actions (click, scroll, type)
- Extract information from web pages
- Take screenshots of page elements when useful
- Provide concise summaries of web content using markdown
- Follow multi-step browsing sequences to complete tasks

Respond back with a status update on completing the commands.";

/// Main configuration for Webpilot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM backend configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Declared MCP tool servers, by name
    #[serde(default = "default_servers")]
    pub servers: BTreeMap<String, ServerConfig>,
    /// Agent configuration
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Supported LLM backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    Gemini,
}

/// LLM backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which backend to bind
    pub provider: ProviderType,
    /// Model name
    /// Default: gemini-2.0-flash
    pub model: String,
    /// API key (usually supplied through the environment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL of the generative language API
    pub base_url: String,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// How to launch one MCP tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Executable to spawn
    pub command: String,
    /// Arguments passed to the executable
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent identity
    pub name: String,
    /// Instruction given to the model as the system prompt
    pub instruction: String,
    /// Tool servers the agent binds to (must be declared under `servers`)
    pub server_names: Vec<String>,
    /// Carry earlier turns into each generation
    pub use_history: bool,
    /// Output token bound per model call
    /// Default: 10000
    pub max_tokens: u32,
    /// Maximum model calls per turn before a final answer is forced
    /// Default: 10
    pub max_iterations: usize,
    /// Maximum stored conversation messages
    /// Default: 200
    pub max_history: usize,
    /// Wall-clock bound for one turn, in seconds (unset or 0 waits forever)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_timeout_secs: Option<u64>,
    /// Whether to show debug output
    pub debug: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderType::Gemini,
            model: env::var("WEBPILOT_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            api_key: env::var("GOOGLE_API_KEY")
                .or_else(|_| env::var("GEMINI_API_KEY"))
                .ok()
                .filter(|k| !k.is_empty()),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 120,
            temperature: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "browser".to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            server_names: vec!["playwright".to_string()],
            use_history: true,
            max_tokens: 10000,
            max_iterations: 10,
            max_history: 200,
            turn_timeout_secs: env::var("WEBPILOT_TURN_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(Some(300)),
            debug: env::var("WEBPILOT_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

impl ServerConfig {
    /// Create a server launched by `command` with `args`
    pub fn new(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }
}

fn default_servers() -> BTreeMap<String, ServerConfig> {
    let mut servers = BTreeMap::new();
    servers.insert(
        "playwright".to_string(),
        ServerConfig::new("npx", &["@playwright/mcp@latest"]),
    );
    servers
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Configuration with the default server table
    pub fn new() -> Self {
        Self {
            llm: LlmConfig::default(),
            servers: default_servers(),
            agent: AgentConfig::default(),
        }
    }

    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("webpilot")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Result<Self> {
        let path = Self::config_file();
        if path.exists() {
            return Self::load_from(&path);
        }

        let _ = dotenvy::dotenv();
        Ok(Self::new())
    }

    /// Load configuration from a specific file, then apply env overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_file(path, |key| env::var(key).ok())
    }

    fn from_file(path: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PilotError::with_context(format!("Failed to read {}", path.display()), e)
        })?;

        // Sections and fields left out of the file fall back to the defaults
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| PilotError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env(var);
        Ok(config)
    }

    /// Environment variables win over values read from the file
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(model) = var("WEBPILOT_MODEL") {
            self.llm.model = model;
        }

        if let Some(key) = var("GOOGLE_API_KEY").or_else(|| var("GEMINI_API_KEY")) {
            self.llm.api_key = Some(key);
        }

        if let Some(secs) = var("WEBPILOT_TURN_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.agent.turn_timeout_secs = Some(secs);
        }

        if let Some(debug) = var("WEBPILOT_DEBUG") {
            self.agent.debug = debug == "true" || debug == "1";
        }
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| PilotError::with_context("Failed to create config dir", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PilotError::config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content).map_err(|e| {
            PilotError::with_context(format!("Failed to write {}", path.display()), e)
        })?;

        Ok(())
    }

    /// Check that the agent can actually be bootstrapped from this configuration
    pub fn validate(&self) -> Result<()> {
        if self.agent.server_names.is_empty() {
            return Err(PilotError::config("agent.server_names is empty"));
        }

        for name in &self.agent.server_names {
            if !self.servers.contains_key(name) {
                return Err(PilotError::config(format!(
                    "server '{}' is not declared under [servers]",
                    name
                )));
            }
        }

        if self.agent.max_tokens == 0 {
            return Err(PilotError::config("agent.max_tokens must be positive"));
        }

        if self.agent.max_iterations == 0 {
            return Err(PilotError::config("agent.max_iterations must be positive"));
        }

        if self.agent.max_history == 0 {
            return Err(PilotError::config("agent.max_history must be positive"));
        }

        Ok(())
    }

    /// Per-turn timeout, if any
    pub fn turn_timeout(&self) -> Option<Duration> {
        self.agent
            .turn_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::new())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
