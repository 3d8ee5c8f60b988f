//! Configuration management for QueryMend.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named data sources, LLM provider settings and workflow
//! limits.

use crate::db::DatabaseBackend;
use crate::error::{QueryMendError, Result};
use crate::llm::{GenerationOptions, LlmProvider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

/// Main configuration structure for QueryMend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Source used when none is given on the command line.
    #[serde(default)]
    pub active_source: Option<String>,

    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Debug loop and execution limits.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Named data sources.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider: "gemini", "openai", "ollama" or "mock".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name; each provider has its own default.
    #[serde(default)]
    pub model: Option<String>,

    /// API key (environment variables take precedence).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Endpoint override (Ollama URL or OpenAI-compatible gateway).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per generator call for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff between generator retries, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl LlmConfig {
    /// Parses the configured provider name.
    pub fn provider(&self) -> Result<LlmProvider> {
        self.provider.parse().map_err(QueryMendError::config)
    }

    /// Returns the retry backoff base delay.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Returns the sampling options sent with every completion.
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Debug loop and execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Maximum debug attempts after the first failed execution.
    #[serde(default = "default_attempt_budget")]
    pub attempt_budget: u32,

    /// Whether failed executions are handed to the debug step.
    #[serde(default = "default_debug_enabled")]
    pub debug_enabled: bool,

    /// Per-execution timeout in seconds; expiry counts as a failed execution.
    #[serde(default = "default_execution_timeout_secs")]
    pub execution_timeout_secs: u64,
}

fn default_attempt_budget() -> u32 {
    3
}

fn default_debug_enabled() -> bool {
    true
}

fn default_execution_timeout_secs() -> u64 {
    30
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            attempt_budget: default_attempt_budget(),
            debug_enabled: default_debug_enabled(),
            execution_timeout_secs: default_execution_timeout_secs(),
        }
    }
}

impl WorkflowConfig {
    /// Returns the execution timeout.
    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }
}

/// A named data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Database backend.
    #[serde(default)]
    pub backend: DatabaseBackend,

    /// Connection URL (`postgres://...`) or SQLite path / `sqlite://` URL.
    pub url: String,

    /// Free-form description shown in source listings.
    #[serde(default)]
    pub description: String,
}

impl SourceConfig {
    /// Creates a source config for the given backend and URL.
    pub fn new(backend: DatabaseBackend, url: impl Into<String>) -> Self {
        Self {
            backend,
            url: url.into(),
            description: String::new(),
        }
    }

    /// Creates a SQLite source from a file path.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self::new(
            DatabaseBackend::Sqlite,
            path.as_ref().to_string_lossy().into_owned(),
        )
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Checks that the URL matches the backend.
    pub fn validate(&self, name: &str) -> Result<()> {
        match self.backend {
            DatabaseBackend::Postgres => {
                let url = Url::parse(&self.url).map_err(|e| {
                    QueryMendError::config(format!("Invalid URL for source '{name}': {e}"))
                })?;
                if url.scheme() != "postgres" && url.scheme() != "postgresql" {
                    return Err(QueryMendError::config(format!(
                        "Invalid scheme '{}' for source '{name}'. Expected 'postgres' or 'postgresql'",
                        url.scheme()
                    )));
                }
                Ok(())
            }
            DatabaseBackend::Sqlite => {
                if self.sqlite_path().as_os_str().is_empty() {
                    return Err(QueryMendError::config(format!(
                        "Source '{name}' has an empty SQLite path"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Returns the SQLite file path, stripping a `sqlite:` scheme if present.
    pub fn sqlite_path(&self) -> PathBuf {
        let raw = self
            .url
            .strip_prefix("sqlite://")
            .or_else(|| self.url.strip_prefix("sqlite:"))
            .unwrap_or(&self.url);
        PathBuf::from(raw)
    }

    /// Returns a display-safe string (no password) for listings.
    pub fn display_string(&self) -> String {
        crate::db::open_source(self).location()
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("querymend")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| QueryMendError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses and validates configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            QueryMendError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;

        config.validate().map_err(|e| {
            QueryMendError::config(format!("Configuration error in {}:\n  {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Checks provider names, source URLs and the active source.
    pub fn validate(&self) -> Result<()> {
        self.llm.provider()?;

        for (name, source) in &self.sources {
            source.validate(name)?;
        }

        if let Some(active) = &self.active_source {
            if !self.sources.contains_key(active) {
                return Err(QueryMendError::config(format!(
                    "active_source '{active}' is not defined under [sources]"
                )));
            }
        }

        Ok(())
    }

    /// Resolves which source to use: the explicit name, else the active source,
    /// else the only configured source.
    pub fn resolve_source_name<'a>(&'a self, name: Option<&'a str>) -> Result<&'a str> {
        if let Some(name) = name {
            return Ok(name);
        }
        if let Some(active) = self.active_source.as_deref() {
            return Ok(active);
        }
        if self.sources.len() == 1 {
            if let Some(only) = self.sources.keys().next() {
                return Ok(only.as_str());
            }
        }
        Err(QueryMendError::config(
            "No data source selected. Pass --source or set active_source in the config file.",
        ))
    }
}
