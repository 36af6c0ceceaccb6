//! Log severity levels.
//!
//! A [`LogLevel`] selects how loudly a scheduler's failure sink reports
//! errors that escaped the grammar (for example a panicking `on_complete`).

use crate::error::Error;
use crate::tracing_compat::{debug, error, info, trace, warn};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Severity level for reported failures.
///
/// Levels are ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LogLevel {
    /// Fine-grained debugging information (very verbose).
    Trace = 0,
    /// Debugging information for development.
    Debug = 1,
    /// General informational messages.
    Info = 2,
    /// Potentially problematic situations.
    Warn = 3,
    /// Error conditions that don't halt execution.
    #[default]
    Error = 4,
}

impl LogLevel {
    /// Returns the level name in lowercase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Returns true if this level is at least as severe as the given level.
    #[must_use]
    pub const fn is_at_least(self, other: Self) -> bool {
        self as u8 >= other as u8
    }

    /// Emits a failure record at this level.
    #[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
    pub(crate) fn report(self, scheduler: &str, failure: &Error) {
        match self {
            Self::Trace => {
                trace!(scheduler, %failure, kind = %failure.kind(), "reported failure");
            }
            Self::Debug => {
                debug!(scheduler, %failure, kind = %failure.kind(), "reported failure");
            }
            Self::Info => {
                info!(scheduler, %failure, kind = %failure.kind(), "reported failure");
            }
            Self::Warn => {
                warn!(scheduler, %failure, kind = %failure.kind(), "reported failure");
            }
            Self::Error => {
                error!(scheduler, %failure, kind = %failure.kind(), "reported failure");
            }
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a level name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level `{0}` (expected trace, debug, info, warn or error)")]
pub struct ParseLevelError(pub String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}
