//! Configuration loading, validation, and management for kbagent.
//!
//! Loads configuration from `~/.kbagent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.kbagent/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which model backend to use. Read by the `ModelInvoker`
    /// implementation the embedding application plugs in; the runtime itself
    /// never talks to a provider.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Agent loop limits
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Knowledge base ingestion and auto-context
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,

    /// Request guardrails
    #[serde(default)]
    pub guardrails: GuardrailConfig,

    /// Code runtime used by the `run_typescript` tool
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-5-mini".into()
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum model turns per run (soft cap)
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Per tool call timeout
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// How many tool calls of one turn may run at once
    #[serde(default = "default_max_parallel_tools")]
    pub max_parallel_tools: usize,

    /// Return an error instead of partial output when a run is cancelled
    #[serde(default)]
    pub discard_on_cancel: bool,

    /// Use the ingested `Agent.md` as the system prompt
    #[serde(default = "default_true")]
    pub agent_prompt_from_index: bool,

    /// Append knowledge-base, service and tool listings to the system prompt
    #[serde(default = "default_true")]
    pub describe_environment: bool,
}

fn default_max_turns() -> u32 {
    8
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_max_parallel_tools() -> usize {
    4
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            tool_timeout_secs: default_tool_timeout_secs(),
            max_parallel_tools: default_max_parallel_tools(),
            discard_on_cancel: false,
            agent_prompt_from_index: true,
            describe_environment: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Root of the foundation tree (`Agent.md`, `docs/`, `apis/`)
    #[serde(default = "default_foundation_dir")]
    pub foundation_dir: PathBuf,

    /// Chunk window in characters
    #[serde(default = "default_chunk_window")]
    pub chunk_window: usize,

    /// Prepend retrieved context to every run
    #[serde(default = "default_true")]
    pub auto_context: bool,

    #[serde(default = "default_top_k")]
    pub auto_context_top_k: usize,
}

fn default_foundation_dir() -> PathBuf {
    PathBuf::from("/var/foundation")
}
fn default_chunk_window() -> usize {
    800
}
fn default_top_k() -> usize {
    4
}
fn default_true() -> bool {
    true
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            foundation_dir: default_foundation_dir(),
            chunk_window: default_chunk_window(),
            auto_context: true,
            auto_context_top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Free-form rules; `deny: keyword` lines reject matching prompts
    #[serde(default)]
    pub rules: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_runtime_url")]
    pub url: String,

    #[serde(default = "default_runtime_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_runtime_url() -> String {
    "http://localhost:3000".into()
}
fn default_runtime_timeout_secs() -> u64 {
    20
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            url: default_runtime_url(),
            timeout_secs: default_runtime_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.kbagent/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `KBAGENT_PROVIDER`, `KBAGENT_MODEL`
    /// - `KBAGENT_FOUNDATION_DIR`
    /// - `TS_RUNTIME_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process env in `load`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("KBAGENT_PROVIDER") {
            self.inference.provider = provider;
        }
        if let Some(model) = lookup("KBAGENT_MODEL") {
            self.inference.model = model;
        }
        if let Some(dir) = lookup("KBAGENT_FOUNDATION_DIR") {
            self.knowledge_base.foundation_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("TS_RUNTIME_URL") {
            self.runtime.url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".kbagent")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_turns must be at least 1".into(),
            ));
        }

        if self.orchestrator.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.tool_timeout_secs must be > 0".into(),
            ));
        }

        if self.orchestrator.max_parallel_tools == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_parallel_tools must be at least 1".into(),
            ));
        }

        if self.knowledge_base.chunk_window == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge_base.chunk_window must be > 0".into(),
            ));
        }

        if self.knowledge_base.auto_context && self.knowledge_base.auto_context_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge_base.auto_context_top_k must be > 0 when auto_context is on".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Render this config as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
