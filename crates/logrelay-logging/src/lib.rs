//! # logrelay-logging
//!
//! `tracing` subscriber setup for the relay binary plus an in-memory capture
//! layer used by tests to assert on emitted events.
//!
//! `RUST_LOG` always takes precedence over the configured level, so a single
//! module can be turned up without touching the settings file.

#![deny(unsafe_code)]

pub mod level;
pub mod test_utils;

pub use level::LogLevel;
pub use logrelay_settings::LogFormat;
pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// Build the filter used by [`init_subscriber`].
///
/// `level` may be a plain level name or a full directive string such as
/// `logrelay_server=debug,tower_http=warn`.
pub fn build_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    directive_filter(level)
}

fn directive_filter(level: &str) -> EnvFilter {
    if level.contains('=') || level.contains(',') {
        if let Ok(filter) = EnvFilter::try_new(level) {
            return filter;
        }
    }
    EnvFilter::new(LogLevel::from_str_lossy(level).to_string())
}

/// Initialize the global tracing subscriber writing to stderr.
///
/// Call once at startup. Later calls are no-ops.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = build_filter(level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init fails only when a global subscriber already exists
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
}
