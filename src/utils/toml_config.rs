//! TOML-based configuration for Mioo
//!
//! Providers, agents and runtime policies are declared in a single file
//! (`mioo.toml`). The file is read once at startup; secrets are never stored in
//! it, only the names of the environment variables that hold them.

use crate::agents::{AgentId, Capability};
use crate::db::DatabaseProvider;
use crate::llm::client::ProviderKind;
use crate::llm::provider_registry::longest_prefix_match;
use crate::llm::retry::RetryPolicy;
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure loaded from mioo.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiooConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Named LLM provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Agent configurations keyed by agent id
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,

    /// Directory relative file references are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

// ============= Database Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// `":memory:"` or a path to a local SQLite file
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Env var holding a remote Turso URL; takes precedence over `url` when set
    pub turso_url_env: Option<String>,

    pub turso_token_env: Option<String>,
}

fn default_database_url() -> String {
    "./data/mioo.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            turso_url_env: None,
            turso_token_env: None,
        }
    }
}

// ============= Gateway Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Per remote call timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Temperature used when an agent does not set its own
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    1.0
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(self.multiplier)
            .with_jitter(self.jitter)
    }
}

// ============= History & Orchestrator Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of messages kept in a conversation window
    #[serde(default = "default_token_limit")]
    pub token_limit: usize,
}

fn default_token_limit() -> usize {
    10
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            token_limit: default_token_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How many of the router's retrieval queries are sent to the retriever
    #[serde(default = "default_max_retrieval_queries")]
    pub max_retrieval_queries: usize,

    /// Field of the retriever reply used as context for the responder
    #[serde(default = "default_retrieval_summary_field")]
    pub retrieval_summary_field: String,
}

fn default_max_retrieval_queries() -> usize {
    1
}

fn default_retrieval_summary_field() -> String {
    "section_250_word_report".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retrieval_queries: default_max_retrieval_queries(),
            retrieval_summary_field: default_retrieval_summary_field(),
        }
    }
}

// ============= Provider & Agent Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: ProviderKind,

    /// Env var holding the API key
    pub api_key_env: String,

    /// Overrides the provider's public endpoint
    pub base_url: Option<String>,

    /// Models whose id starts with one of these are served by this provider
    #[serde(default)]
    pub model_prefixes: Vec<String>,

    /// Serves every model no prefix matches
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub capability: Capability,

    pub model: String,

    pub temperature: Option<f32>,

    /// Inline instructions
    pub instructions: Option<String>,

    /// Instructions loaded from a file, relative to the config file
    pub instructions_file: Option<String>,

    /// Inline JSON contract
    pub response_contract: Option<String>,

    pub response_contract_file: Option<String>,

    #[serde(default = "default_true")]
    pub include_history: bool,
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

    #[error("Unknown agent '{0}' in configuration")]
    UnknownAgent(String),

    #[error("Agent '{agent}' must have capability {expected:?}, found {found:?}")]
    CapabilityMismatch {
        agent: String,
        expected: Capability,
        found: Capability,
    },

    #[error("No router agent configured")]
    MissingRouter,

    #[error("Agent '{0}' has no instructions")]
    MissingInstructions(String),

    #[error("No provider serves model '{0}' used by agent '{1}'")]
    MissingProvider(String, String),

    #[error("Agent '{agent}' has an invalid response contract: {reason}")]
    InvalidContract { agent: String, reason: String },
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl MiooConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Parse without validating. File references resolve against the current directory.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: MiooConfig = toml::from_str(content)?;
        config.base_dir = PathBuf::from(".");
        Ok(config)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref env) = self.database.turso_url_env {
            self.validate_env_var(env)?;
        }
        if let Some(ref env) = self.database.turso_token_env {
            self.validate_env_var(env)?;
        }

        if self.history.token_limit < 2 {
            return Err(ConfigError::ValidationError(format!(
                "history.token_limit must be at least 2, got {}",
                self.history.token_limit
            )));
        }
        if self.gateway.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let defaults = self.providers.values().filter(|p| p.default).count();
        if defaults > 1 {
            return Err(ConfigError::ValidationError(
                "at most one provider may be marked default".to_string(),
            ));
        }
        for provider in self.providers.values() {
            self.validate_env_var(&provider.api_key_env)?;
        }

        let mut has_router = false;
        for (name, agent) in &self.agents {
            let id: AgentId = name
                .parse()
                .map_err(|_| ConfigError::UnknownAgent(name.clone()))?;

            let expected = id.expected_capability();
            if agent.capability != expected {
                return Err(ConfigError::CapabilityMismatch {
                    agent: name.clone(),
                    expected,
                    found: agent.capability,
                });
            }
            has_router |= agent.capability == Capability::Router;

            if self.provider_for_model(&agent.model).is_none() {
                return Err(ConfigError::MissingProvider(
                    agent.model.clone(),
                    name.clone(),
                ));
            }

            if let Some(temperature) = agent.temperature {
                if !(0.0..=2.0).contains(&temperature) {
                    return Err(ConfigError::ValidationError(format!(
                        "agent '{}' temperature {} is outside 0.0..=2.0",
                        name, temperature
                    )));
                }
            }

            match (&agent.instructions, &agent.instructions_file) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::ValidationError(format!(
                        "agent '{}' sets both instructions and instructions_file",
                        name
                    )));
                }
                (None, None) => return Err(ConfigError::MissingInstructions(name.clone())),
                (None, Some(file)) => self.validate_file(file)?,
                (Some(text), None) if text.trim().is_empty() => {
                    return Err(ConfigError::MissingInstructions(name.clone()));
                }
                (Some(_), None) => {}
            }

            if agent.response_contract.is_some() && agent.response_contract_file.is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "agent '{}' sets both response_contract and response_contract_file",
                    name
                )));
            }
            if let Some(ref file) = agent.response_contract_file {
                self.validate_file(file)?;
            }
        }

        if !has_router {
            return Err(ConfigError::MissingRouter);
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    fn validate_file(&self, file: &str) -> Result<(), ConfigError> {
        let path = self.resolve_path(file);
        if path.is_file() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(format!(
                "referenced file does not exist: {}",
                path.display()
            )))
        }
    }

    /// Resolve a config-relative path.
    pub fn resolve_path(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Get the value of an environment variable named in the config
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Name of the provider serving `model`: longest matching prefix, else the default.
    pub fn provider_for_model(&self, model: &str) -> Option<&str> {
        let prefixed = self.providers.iter().flat_map(|(name, provider)| {
            provider
                .model_prefixes
                .iter()
                .map(move |prefix| (prefix.as_str(), name.as_str()))
        });

        longest_prefix_match(model, prefixed).or_else(|| {
            self.providers
                .iter()
                .find(|(_, provider)| provider.default)
                .map(|(name, _)| name.as_str())
        })
    }

    pub fn get_agent(&self, id: AgentId) -> Option<&AgentConfig> {
        self.agents.get(id.as_str())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.timeout_secs)
    }

    /// Storage backend described by `[database]`.
    pub fn database_provider(&self) -> Result<DatabaseProvider, ConfigError> {
        if let Some(ref url_env) = self.database.turso_url_env {
            let url = self
                .resolve_env(url_env)
                .ok_or_else(|| ConfigError::MissingEnvVar(url_env.clone()))?;
            let token = match self.database.turso_token_env {
                Some(ref token_env) => self
                    .resolve_env(token_env)
                    .ok_or_else(|| ConfigError::MissingEnvVar(token_env.clone()))?,
                None => String::new(),
            };
            return Ok(DatabaseProvider::Turso { url, token });
        }

        if self.database.url == ":memory:" {
            Ok(DatabaseProvider::Memory)
        } else {
            Ok(DatabaseProvider::SQLite {
                path: self.resolve_path(&self.database.url),
            })
        }
    }
}
