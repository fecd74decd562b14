//! Configuration loading, validation, and management for AgentCost.
//!
//! A [`TrackerConfig`] is supplied once when a tracker is built and never
//! changes afterwards. It can be assembled in code, parsed from TOML, or
//! loaded from `~/.agentcost/config.toml` with environment variable
//! overrides. Every optional field has a default carried by the struct
//! itself, so two trackers in one process never share hidden state.

use agentcost_core::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Collector URL used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://api.agentcost.dev/api/track";

/// Everything a tracker needs to know, fixed for its lifetime.
///
/// Maps directly to `~/.agentcost/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Project the events are attributed to.
    #[serde(default)]
    pub project_id: String,

    /// Credential presented to the collector.
    #[serde(default)]
    pub api_key: String,

    /// Collector URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Queue length that triggers an immediate flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Milliseconds between timer-driven flushes.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Verbose diagnostics for queueing, flushing, and cost calculation.
    #[serde(default)]
    pub debug: bool,

    /// Delivery retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Extra or overriding model rates, keyed by provider then model.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_pricing: BTreeMap<String, BTreeMap<String, PricingOverrideConfig>>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_batch_size() -> usize {
    10
}
fn default_flush_interval_ms() -> u64 {
    5_000
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("batch_size", &self.batch_size)
            .field("flush_interval_ms", &self.flush_interval_ms)
            .field("debug", &self.debug)
            .field("retry", &self.retry)
            .field("custom_pricing", &self.custom_pricing)
            .finish()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &str) -> &'static str {
    if s.is_empty() { "None" } else { "[REDACTED]" }
}

/// Capped exponential backoff for collector delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per flush, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound on any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Custom per-million-token pricing for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingOverrideConfig {
    /// Price per 1M input tokens in USD
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD
    pub output_per_m: f64,
}

impl TrackerConfig {
    /// A configuration with the required fields set and defaults elsewhere.
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Override the collector URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the flush-triggering queue length.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Override the timer period.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Toggle verbose diagnostics.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Override the delivery retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Add or replace the rates for one model.
    pub fn with_custom_pricing(
        mut self,
        provider: ProviderKind,
        model: impl Into<String>,
        input_per_m: f64,
        output_per_m: f64,
    ) -> Self {
        self.custom_pricing
            .entry(provider.as_str().to_string())
            .or_default()
            .insert(
                model.into(),
                PricingOverrideConfig {
                    input_per_m,
                    output_per_m,
                },
            );
        self
    }

    /// Timer period as a `Duration`.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Load configuration from the default path (~/.agentcost/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `AGENTCOST_PROJECT_ID`
    /// - `AGENTCOST_API_KEY`
    /// - `AGENTCOST_ENDPOINT`
    /// - `AGENTCOST_DEBUG`
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`TrackerConfig::load`], but without requiring credentials.
    ///
    /// For commands that only need the pricing overrides.
    pub fn load_unvalidated() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::read_file(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file yields the defaults, which then fail validation
    /// because the project id and API key are required.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(project_id) = lookup("AGENTCOST_PROJECT_ID") {
            self.project_id = project_id;
        }
        if let Some(api_key) = lookup("AGENTCOST_API_KEY") {
            self.api_key = api_key;
        }
        if let Some(endpoint) = lookup("AGENTCOST_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(debug) = lookup("AGENTCOST_DEBUG") {
            self.debug = matches!(debug.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentcost")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::ValidationError("project_id is required".into()));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationError("api_key is required".into()));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationError("batch_size must be at least 1".into()));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::ValidationError("flush_interval_ms must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "retry.backoff_multiplier must be a finite number >= 1.0".into(),
            ));
        }

        for (provider, models) in &self.custom_pricing {
            provider
                .parse::<ProviderKind>()
                .map_err(|e| ConfigError::ValidationError(format!("custom_pricing: {e}")))?;
            for (model, rates) in models {
                let valid = |r: f64| r.is_finite() && r >= 0.0;
                if !valid(rates.input_per_m) || !valid(rates.output_per_m) {
                    return Err(ConfigError::ValidationError(format!(
                        "custom_pricing.{provider}.{model}: rates must be finite and non-negative"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Generate a starter config TOML string.
    pub fn default_toml() -> String {
        let config = Self::new("your-project-id", "your-api-key");
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            debug: false,
            retry: RetryConfig::default(),
            custom_pricing: BTreeMap::new(),
        }
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
