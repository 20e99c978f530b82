//! Service configuration.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables. Every field has a default so an empty file is a valid config.

use crate::error::{self, Error, Result};
use crate::persona::DEFAULT_MAX_PERSONALITIES;
use crate::provider::ProviderConfig;
use crate::rubric::{Rubric, RubricSetting};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Completion endpoint
    pub llm: LlmConfig,

    /// Transcript storage
    pub storage: StorageConfig,

    /// Peer transaction-analysis service
    pub relay: RelayConfig,

    /// HTTP surface
    pub server: ServerConfig,

    /// Scoring
    pub evaluation: EvaluationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Falls back to `ASI_ONE_API_KEY`
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Used for free-form dialogue
    pub temperature: f32,
    /// Used for structured extraction (personas, scores)
    pub deterministic_temperature: f32,
    pub max_tokens: Option<usize>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.asi1.ai/v1".into(),
            model: "asi1-mini".into(),
            api_key: None,
            timeout_secs: 30,
            temperature: 0.7,
            deterministic_temperature: 0.3,
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    pub fn provider_config(&self) -> ProviderConfig {
        let mut config = ProviderConfig::local(self.base_url.clone(), self.model.clone())
            .with_timeout(self.timeout_secs);
        config.api_key = self.api_key.clone();
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./storage"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay is disabled when unset
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
            max_attempts: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            cache_capacity: 1024,
            cache_ttl_secs: 3600,
            queue_capacity: 256,
        }
    }
}

impl RelayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// How the REST surface is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportMode {
    /// Routes at the root; unexpected errors become HTTP error statuses
    #[default]
    PlainHttp,
    /// Routes under `/rest`; every path answers with a fallback, never an error status
    MessageProtocol,
}

impl TransportMode {
    pub fn route_prefix(&self) -> &'static str {
        match self {
            TransportMode::PlainHttp => "",
            TransportMode::MessageProtocol => "/rest",
        }
    }
}

impl std::str::FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain-http" | "http" => Ok(TransportMode::PlainHttp),
            "message-protocol" | "agent" => Ok(TransportMode::MessageProtocol),
            other => Err(Error::invalid_argument(format!("unknown transport '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub transport: TransportMode,
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            transport: TransportMode::PlainHttp,
            cors_permissive: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub rubric: RubricSetting,
    /// What kind of agent is under test, used in prompts
    pub domain: String,
    /// Most personas one generation request may ask for
    pub max_personalities: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            rubric: RubricSetting::default(),
            domain: "DeFi blockchain agent".into(),
            max_personalities: DEFAULT_MAX_PERSONALITIES,
        }
    }
}

impl ServiceConfig {
    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::from(e).with_operation("config::load").with_context("path", path.display().to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            Error::config_invalid(format!("invalid config: {}", e)).set_source(e)
        })
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ASI_ONE_API_KEY").filter(|k| !k.is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("FIREGLOBE_RELAY_URL").filter(|u| !u.is_empty()) {
            self.relay.base_url = Some(url);
        }
        if let Some(dir) = lookup("FIREGLOBE_STORAGE_DIR").filter(|d| !d.is_empty()) {
            self.storage.dir = PathBuf::from(dir);
        }
    }

    /// Resolve the configured rubric
    pub fn rubric(&self) -> Result<Rubric> {
        self.evaluation.rubric.resolve()
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(Error::config_invalid("llm.model must not be empty"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(Error::config_invalid("llm.timeout_secs must be positive"));
        }
        if self.relay.max_attempts == 0 {
            return Err(Error::config_invalid("relay.max_attempts must be at least 1"));
        }
        if self.relay.cache_capacity == 0 || self.relay.queue_capacity == 0 {
            return Err(Error::config_invalid("relay cache and queue capacities must be positive"));
        }
        if self.evaluation.max_personalities == 0 {
            return Err(Error::config_invalid("evaluation.max_personalities must be at least 1"));
        }
        self.rubric().map(|_| ())
    }

    /// Render as TOML, e.g. for `--print-config`
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| error::serialization_error(e.to_string()))
    }
}
