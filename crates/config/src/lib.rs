//! Configuration management for Kestrel.
//!
//! Loads and saves run parameters from a JSON file under ~/.kestrel.
//! Everything the orchestration core consumes (iteration budget, allowed
//! filesystem roots, file-context truncation threshold) lives here and is
//! passed into constructors explicitly; there is no ambient global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub mod paths;

pub use paths::{config_path, data_dir, workspace_path};

/// Errors in configuration handling
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config not found: {0}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Credentials for one model provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

/// All configured model providers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
}

/// Default agent parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Iteration budget for one run of the tool loop.
    #[serde(default = "default_max_iterations")]
    pub max_tool_iterations: u32,
    /// Directories filesystem capabilities may touch. Empty means
    /// "workspace only".
    #[serde(default)]
    pub allowed_roots: Vec<String>,
    /// File content longer than this many characters is elided in the
    /// assembled context.
    #[serde(default = "default_file_context_max_chars")]
    pub file_context_max_chars: usize,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_tool_iterations: default_max_iterations(),
            allowed_roots: Vec::new(),
            file_context_max_chars: default_file_context_max_chars(),
        }
    }
}

fn default_workspace() -> String {
    "~/.kestrel/ws".to_string()
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_iterations() -> u32 {
    10
}

fn default_file_context_max_chars() -> usize {
    4000
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

/// Web search capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_max_results() -> u32 {
    5
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            max_results: default_max_results(),
        }
    }
}

/// Capability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web_search: WebSearchConfig,
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from the default location
    pub async fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(&path).await
    }

    /// Load from a specific location
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        debug!("loading config from {:?}", path);
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub async fn save(&self) -> Result<()> {
        let path = config_path();
        self.save_to(&path).await
    }

    /// Save to a specific location
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        debug!("writing config to {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Resolve the workspace directory, expanding a leading tilde
    pub fn workspace_path(&self) -> PathBuf {
        expand_tilde(&self.agent.defaults.workspace)
    }

    /// Allowed filesystem roots, tilde-expanded. Falls back to the
    /// workspace when none are configured.
    pub fn allowed_roots(&self) -> Vec<PathBuf> {
        if self.agent.defaults.allowed_roots.is_empty() {
            return vec![self.workspace_path()];
        }
        self.agent
            .defaults
            .allowed_roots
            .iter()
            .map(|r| expand_tilde(r))
            .collect()
    }

    /// First configured API key, preferring OpenRouter
    pub fn api_key(&self) -> Option<String> {
        let key = self.providers.openrouter.api_key.clone();
        if !key.is_empty() {
            return Some(key);
        }

        let key = self.providers.openai.api_key.clone();
        if !key.is_empty() {
            return Some(key);
        }

        None
    }

    /// API base matching the selected key, if overridden
    pub fn api_base(&self) -> Option<String> {
        if !self.providers.openrouter.api_key.is_empty() {
            return self.providers.openrouter.api_base.clone();
        }
        if !self.providers.openai.api_key.is_empty() {
            return self.providers.openai.api_base.clone();
        }
        None
    }

    pub fn default_model(&self) -> String {
        self.agent.defaults.model.clone()
    }

    pub fn max_tokens(&self) -> u32 {
        self.agent.defaults.max_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.agent.defaults.temperature
    }

    /// Iteration budget, clamped to at least one turn
    pub fn max_tool_iterations(&self) -> u32 {
        self.agent.defaults.max_tool_iterations.max(1)
    }

    pub fn file_context_max_chars(&self) -> usize {
        self.agent.defaults.file_context_max_chars
    }

    pub fn web_search_api_key(&self) -> Option<String> {
        let key = self.tools.web_search.api_key.clone();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    pub fn web_search_max_results(&self) -> u32 {
        self.tools.web_search.max_results
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Load the config if present, otherwise write defaults and return them
pub async fn init() -> Result<Config> {
    let path = config_path();
    if path.exists() {
        return Config::load_from(&path).await;
    }

    let config = Config::default();
    config.save_to(&path).await?;
    info!("created default config at {:?}", path);
    Ok(config)
}
