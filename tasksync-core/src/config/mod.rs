//! Configuration management for tasksync
//!
//! Configuration can come from a TOML file or from environment variables.
//! The backend URL and public API key have no usable defaults: a missing or
//! empty value is a validation error, never an empty-string fallback.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

mod error;

pub use error::ConfigError;

use crate::backend::DEFAULT_AUTH_EVENT_CAPACITY;
use crate::logging::LogLevel;
use crate::settings::ReloadPolicy;

/// Service URL of the hosted backend
pub const ENV_BACKEND_URL: &str = "SUPABASE_URL";
/// Public (anon) API key of the hosted backend
pub const ENV_BACKEND_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_REQUEST_TIMEOUT: &str = "TASKSYNC_REQUEST_TIMEOUT";
pub const ENV_RELOAD_POLICY: &str = "TASKSYNC_RELOAD_POLICY";
pub const ENV_AUTH_EVENT_CAPACITY: &str = "TASKSYNC_AUTH_EVENT_CAPACITY";
pub const ENV_LOG_LEVEL: &str = "TASKSYNC_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "TASKSYNC_LOG_JSON";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hosted backend connection
    pub backend: BackendConfig,

    /// Store synchronization behavior
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosted backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Service URL, e.g. `https://<project>.supabase.co`
    pub url: String,

    /// Public API key sent with every request
    pub anon_key: String,

    /// Per-request HTTP timeout
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

/// Store synchronization behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How overlapping settings reloads are resolved
    #[serde(default)]
    pub reload_policy: ReloadPolicy,

    /// Buffered auth changes per subscriber
    #[serde(default = "default_auth_event_capacity")]
    pub auth_event_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_auth_event_capacity() -> usize {
    DEFAULT_AUTH_EVENT_CAPACITY
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reload_policy: ReloadPolicy::default(),
            auth_event_capacity: default_auth_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            ..Self::default()
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// `SUPABASE_URL` and `SUPABASE_ANON_KEY` are required. Optional
    /// overrides use the `TASKSYNC_` prefix, e.g. `TASKSYNC_REQUEST_TIMEOUT=5s`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
        };

        let mut config = Self {
            backend: BackendConfig::new(require(ENV_BACKEND_URL)?, require(ENV_BACKEND_ANON_KEY)?),
            ..Self::default()
        };

        // Backend config
        if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT) {
            config.backend.request_timeout = humantime::parse_duration(&timeout)
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid request timeout: {}", e)))?;
        }

        // Sync config
        if let Some(policy) = lookup(ENV_RELOAD_POLICY) {
            config.sync.reload_policy = policy.parse()?;
        }
        if let Some(capacity) = lookup(ENV_AUTH_EVENT_CAPACITY) {
            config.sync.auth_event_capacity = capacity.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid auth event capacity: {}", e))
            })?;
        }

        // Logging config
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.logging.level = level;
        }
        if let Some(json) = lookup(ENV_LOG_JSON) {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate backend config
        if self.backend.url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "backend url must be set".to_string(),
            ));
        }
        let url = url::Url::parse(&self.backend.url)
            .map_err(|e| ConfigError::ValidationFailed(format!("Invalid backend url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationFailed(format!(
                "backend url must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.backend.anon_key.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "backend anon_key must be set".to_string(),
            ));
        }

        if self.backend.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        // Validate sync config
        if self.sync.auth_event_capacity == 0 {
            return Err(ConfigError::ValidationFailed(
                "auth_event_capacity must be greater than 0".to_string(),
            ));
        }

        // Validate logging config
        self.logging
            .level
            .parse::<LogLevel>()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}
