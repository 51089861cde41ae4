//! Configuration loading, validation, and management for RoleMatch.
//!
//! Loads configuration from `~/.rolematch/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.rolematch/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the oracle endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Oracle endpoint and model settings
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Batch/retry executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Request size limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("oracle", &self.oracle)
            .field("executor", &self.executor)
            .field("limits", &self.limits)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Provider name ("openai", "openrouter", "ollama", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override for the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for score matrix requests
    #[serde(default = "default_scoring_temperature")]
    pub scoring_temperature: f32,

    /// Temperature for explanation requests
    #[serde(default = "default_explanation_temperature")]
    pub explanation_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_scoring_temperature() -> f32 {
    0.2
}
fn default_explanation_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            scoring_temperature: default_scoring_temperature(),
            explanation_temperature: default_explanation_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Units in flight at once (group size)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retry ceiling for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff base; retry `k` waits `base * 2^k`
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Pause between consecutive groups
    #[serde(default = "default_group_pause_ms")]
    pub group_pause_ms: u64,

    /// Re-attempt still-failing transient units once after the first pass
    #[serde(default = "default_true")]
    pub second_pass: bool,

    /// Upper bound of the random delay before a second-pass attempt
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,
}

fn default_concurrency() -> usize {
    5
}
fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_group_pause_ms() -> u64 {
    250
}
fn default_jitter_max_ms() -> u64 {
    2000
}
fn default_true() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            group_pause_ms: default_group_pause_ms(),
            second_pass: true,
            jitter_max_ms: default_jitter_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Rosters accepted by one batch call
    #[serde(default = "default_max_batch_rosters")]
    pub max_batch_rosters: usize,

    /// Member submissions accepted by one bulk call
    #[serde(default = "default_max_bulk_members")]
    pub max_bulk_members: usize,
}

fn default_max_batch_rosters() -> usize {
    100
}
fn default_max_bulk_members() -> usize {
    500
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_batch_rosters: default_max_batch_rosters(),
            max_bulk_members: default_max_bulk_members(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.rolematch/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `ROLEMATCH_API_KEY`, then `OPENAI_API_KEY` (only if no key is configured)
    /// - `ROLEMATCH_MODEL`
    /// - `ROLEMATCH_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
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

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("ROLEMATCH_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(model) = lookup("ROLEMATCH_MODEL") {
            self.oracle.model = model;
        }

        if let Some(url) = lookup("ROLEMATCH_API_URL") {
            self.oracle.api_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rolematch")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, t) in [
            ("scoring_temperature", self.oracle.scoring_temperature),
            ("explanation_temperature", self.oracle.explanation_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(format!(
                    "oracle.{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.oracle.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("oracle.model must not be empty".into()));
        }

        if self.executor.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "executor.concurrency must be at least 1".into(),
            ));
        }

        if self.limits.max_batch_rosters == 0 || self.limits.max_bulk_members == 0 {
            return Err(ConfigError::ValidationError(
                "limits must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            oracle: OracleConfig::default(),
            executor: ExecutorConfig::default(),
            limits: LimitsConfig::default(),
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
