//! Log level names accepted in settings and on the command line.

use serde::{Deserialize, Serialize};

/// Minimum severity emitted by the subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Frame-level detail (every broadcast delivery).
    Trace,
    /// Subscription changes and handshake decisions.
    Debug,
    /// Connection lifecycle and startup.
    #[default]
    Info,
    /// Rejected handshakes and dropped clients.
    Warn,
    /// Failures that need operator attention.
    Error,
}

impl LogLevel {
    /// Parse a level name (case-insensitive). Unknown names fall back to `Info`.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" | "fatal" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Equivalent `tracing` level.
    #[must_use]
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}
