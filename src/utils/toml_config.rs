//! TOML-based configuration for Forma
//!
//! This module provides declarative configuration for the orchestrator,
//! logging, tool retries, the LLM endpoint and the agents to register via a
//! TOML file (`forma.toml`).

use crate::tools::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from forma.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormaConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Retry policy applied to every tool built from configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// LLM endpoint shared by `llm` agents
    #[serde(default)]
    pub llm: Option<LlmConfig>,

    /// Agent configurations keyed by registry name
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
}

// ============= Orchestrator Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_orchestrator_name")]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Ceiling on concurrently running steps
    #[serde(default = "default_max_parallel_steps")]
    pub max_parallel_steps: usize,

    /// Per-step timeout in milliseconds; steps run unbounded when unset
    #[serde(default)]
    pub step_timeout_ms: Option<u64>,

    /// Number of completed runs kept for `history()`
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_orchestrator_name() -> String {
    "forma".to_string()
}

fn default_max_parallel_steps() -> usize {
    3
}

fn default_history_limit() -> usize {
    50
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            name: default_orchestrator_name(),
            description: None,
            max_parallel_steps: default_max_parallel_steps(),
            step_timeout_ms: None,
            history_limit: default_history_limit(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_max_parallel_steps(mut self, max: usize) -> Self {
        self.max_parallel_steps = max;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout_ms = Some(timeout.as_millis().max(1) as u64);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ============= Retry Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_jitter() -> f64 {
    0.2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_jitter(self.jitter)
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable containing the API key (optional for local endpoints)
    #[serde(default)]
    pub api_key_env: Option<String>,

    pub model: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    crate::llm::openai::DEFAULT_API_BASE.to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentConfig {
    /// Prompt-in, text-out agent backed by the `[llm]` endpoint
    Llm {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        system_prompt: Option<String>,
        /// Overrides `[llm].model` for this agent
        #[serde(default)]
        model: Option<String>,
    },
    /// Forwards its input to a JSON-over-HTTP service
    Http {
        endpoint: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        api_key_env: Option<String>,
        #[serde(default = "default_http_timeout")]
        timeout_secs: u64,
    },
    /// Returns its input unchanged
    Passthrough {
        #[serde(default)]
        description: Option<String>,
    },
}

fn default_http_timeout() -> u64 {
    30
}

impl AgentConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentConfig::Llm { .. } => "llm",
            AgentConfig::Http { .. } => "http",
            AgentConfig::Passthrough { .. } => "passthrough",
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            AgentConfig::Llm { description, .. }
            | AgentConfig::Http { description, .. }
            | AgentConfig::Passthrough { description } => description.as_deref(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Agent '{0}' is an llm agent but no [llm] section is configured")]
    MissingLlm(String),
}

impl FormaConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: FormaConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "orchestrator.name must not be empty".to_string(),
            ));
        }
        if self.orchestrator.max_parallel_steps == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_parallel_steps must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.step_timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "orchestrator.step_timeout_ms must be at least 1 when set".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::ValidationError(format!(
                "retry.jitter must be within 0.0..=1.0, got {}",
                self.retry.jitter
            )));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }

        if let Some(llm) = &self.llm {
            if llm.model.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "llm.model must not be empty".to_string(),
                ));
            }
        }

        for (name, agent) in &self.agents {
            match agent {
                AgentConfig::Llm { .. } if self.llm.is_none() => {
                    return Err(ConfigError::MissingLlm(name.clone()));
                }
                AgentConfig::Http { endpoint, .. }
                    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) =>
                {
                    return Err(ConfigError::ValidationError(format!(
                        "Agent '{}' has an invalid endpoint '{}'",
                        name, endpoint
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Get agent config by name
    pub fn get_agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name)
    }
}

/// Resolve an optional env var reference, failing if it is named but unset
pub fn resolve_env(env_name: Option<&str>) -> Result<Option<String>, ConfigError> {
    match env_name {
        None => Ok(None),
        Some(name) => std::env::var(name)
            .map(Some)
            .map_err(|_| ConfigError::MissingEnvVar(name.to_string())),
    }
}
