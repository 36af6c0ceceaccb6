//! Scheduler configuration.
//!
//! [`SchedulerConfig`] controls the default trampoline scheduler: how loudly
//! reported failures are logged, how large each thread's run queue starts,
//! and whether trampolined tasks are isolated from panics.
//!
//! Configuration sources, lowest to highest precedence:
//!
//! 1. [`SchedulerConfig::default`]
//! 2. a TOML document (`config-file` feature)
//! 3. environment variables ([`SchedulerConfig::apply_env`])
//!
//! | Variable                   | Field            |
//! |----------------------------|------------------|
//! | `ACKSTREAM_FAILURE_LEVEL`  | `failure_level`  |
//! | `ACKSTREAM_QUEUE_CAPACITY` | `queue_capacity` |
//! | `ACKSTREAM_CATCH_PANICS`   | `catch_panics`   |

use crate::observability::LogLevel;
use serde::{Deserialize, Serialize};

/// Environment variable selecting [`SchedulerConfig::failure_level`].
pub const ENV_FAILURE_LEVEL: &str = "ACKSTREAM_FAILURE_LEVEL";
/// Environment variable selecting [`SchedulerConfig::queue_capacity`].
pub const ENV_QUEUE_CAPACITY: &str = "ACKSTREAM_QUEUE_CAPACITY";
/// Environment variable selecting [`SchedulerConfig::catch_panics`].
pub const ENV_CATCH_PANICS: &str = "ACKSTREAM_CATCH_PANICS";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value could not be parsed for the given key.
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        /// Configuration key or environment variable.
        key: &'static str,
        /// The offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration document is malformed.
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Settings for [`TrampolineScheduler`](crate::runtime::TrampolineScheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Level used when logging failures sent to the failure sink.
    pub failure_level: LogLevel,
    /// Initial capacity of each thread's trampoline queue.
    pub queue_capacity: usize,
    /// Run each trampolined task under `catch_unwind`.
    pub catch_panics: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            failure_level: LogLevel::Error,
            queue_capacity: 64,
            catch_panics: true,
        }
    }
}

impl SchedulerConfig {
    /// Sets the failure log level.
    #[must_use]
    pub const fn with_failure_level(mut self, level: LogLevel) -> Self {
        self.failure_level = level;
        self
    }

    /// Sets the initial trampoline queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Enables or disables panic isolation for trampolined tasks.
    #[must_use]
    pub const fn with_catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Overrides fields from `lookup`, which maps variable names to values.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_FAILURE_LEVEL) {
            self.failure_level = value.parse().map_err(|err: crate::observability::ParseLevelError| {
                ConfigError::InvalidValue {
                    key: ENV_FAILURE_LEVEL,
                    value: value.clone(),
                    reason: err.to_string(),
                }
            })?;
        }
        if let Some(value) = lookup(ENV_QUEUE_CAPACITY) {
            self.queue_capacity =
                value
                    .trim()
                    .parse()
                    .map_err(|err: std::num::ParseIntError| ConfigError::InvalidValue {
                        key: ENV_QUEUE_CAPACITY,
                        value: value.clone(),
                        reason: err.to_string(),
                    })?;
        }
        if let Some(value) = lookup(ENV_CATCH_PANICS) {
            self.catch_panics = parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: ENV_CATCH_PANICS,
                value: value.clone(),
                reason: "expected true/false, 1/0, yes/no or on/off".to_string(),
            })?;
        }
        Ok(self)
    }

    /// Parses a TOML document. Missing fields keep their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        toml::from_str(document).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Reads and parses a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path)?;
        Self::from_toml_str(&document)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
