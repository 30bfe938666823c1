//! Logging setup for tasksync
//!
//! Installs a global `tracing` subscriber with an env filter and either a
//! human-readable or a JSON formatter. `RUST_LOG` overrides the configured
//! level when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Subscriber options
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    /// Include the module path of each event
    pub with_target: bool,
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Build from the `[logging]` section of the application config
    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggingError> {
        let level = config.level.parse()?;
        Ok(Self {
            level,
            with_timestamp: config.with_timestamp,
            with_target: config.with_target,
            json_format: config.json_format,
        })
    }
}

/// Initialize logging at `info` with the default formatter
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with custom options
///
/// Fails if a global subscriber is already installed.
///
/// # Example
/// ```
/// use tasksync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// let config = LogConfig::new(LogLevel::Debug).with_target(false);
/// init_logging_with_config(config).expect("Failed to initialize logging");
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(config.with_target);

    let result = match (config.json_format, config.with_timestamp) {
        (true, true) => registry.with(layer.json()).try_init(),
        (true, false) => registry.with(layer.json().without_time()).try_init(),
        (false, true) => registry.with(layer).try_init(),
        (false, false) => registry.with(layer.without_time()).try_init(),
    };

    result.map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
