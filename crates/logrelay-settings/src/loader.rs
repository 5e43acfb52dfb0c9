//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `RELAY_*` environment overrides (highest priority)
//! 4. Validate cross-field constraints
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{AuthMode, JwtSettings, LogFormat, RelaySettings};

/// Resolve the default settings file path (`~/.logrelay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".logrelay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with process env overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    load_settings_with_env(path, |key| std::env::var(key).ok())
}

/// Load settings from `path`, reading overrides through `env`.
pub fn load_settings_with_env<F>(path: &Path, env: F) -> Result<RelaySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: RelaySettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `RELAY_*` overrides read through `env`.
///
/// Invalid values are ignored with a warning and the file/default value
/// stays in effect. `RELAY_ALLOWED_ORIGINS` is comma-separated and appends
/// to the configured list rather than replacing it.
pub fn apply_env_overrides<F>(settings: &mut RelaySettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    let reader = EnvReader { env };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = reader.string("RELAY_HOST") {
        settings.server.host = v;
    }
    // `PORT` is what most hosting platforms inject; the prefixed name wins.
    if let Some(v) = reader.u16("PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = reader.u16("RELAY_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = reader.usize("RELAY_MAX_CONNECTIONS", 1, 1_000_000) {
        settings.server.max_connections = v;
    }
    if let Some(v) = reader.u64("RELAY_HEARTBEAT_INTERVAL_SECS", 1, 3_600) {
        settings.server.heartbeat_interval_secs = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = reader.string("RELAY_AUTH_MODE") {
        match AuthMode::parse(&v) {
            Some(mode) => settings.auth.mode = mode,
            None => warn!(key = "RELAY_AUTH_MODE", value = %v, "unknown auth mode, ignoring"),
        }
    }
    if let Some(v) = reader.string("RELAY_DEV_TOKEN") {
        settings.auth.dev_token = v;
    }
    if let Some(v) = reader.u64("RELAY_VERIFY_TIMEOUT_MS", 100, 120_000) {
        settings.auth.verify_timeout_ms = v;
    }
    let jwt_secret = reader.string("RELAY_JWT_SECRET");
    let jwt_key_path = reader.string("RELAY_JWT_PUBLIC_KEY_PATH");
    let jwt_issuer = reader.string("RELAY_JWT_ISSUER");
    let jwt_audience = reader.string("RELAY_JWT_AUDIENCE");
    let jwt_algorithm = reader.string("RELAY_JWT_ALGORITHM");
    if jwt_secret.is_some()
        || jwt_key_path.is_some()
        || jwt_issuer.is_some()
        || jwt_audience.is_some()
        || jwt_algorithm.is_some()
    {
        let jwt = settings.auth.jwt.get_or_insert_with(JwtSettings::default);
        if let Some(v) = jwt_secret {
            jwt.secret = Some(v);
        }
        if let Some(v) = jwt_key_path {
            jwt.public_key_path = Some(v);
        }
        if let Some(v) = jwt_issuer {
            jwt.issuer = Some(v);
        }
        if let Some(v) = jwt_audience {
            jwt.audience = Some(v);
        }
        if let Some(v) = jwt_algorithm {
            jwt.algorithm = v;
        }
    }

    // ── Origins / ingest ────────────────────────────────────────────
    if let Some(v) = reader.string("RELAY_ALLOWED_ORIGINS") {
        for origin in parse_list(&v) {
            if !settings.origins.allowed.contains(&origin) {
                settings.origins.allowed.push(origin);
            }
        }
    }
    if let Some(v) = reader.string("RELAY_INGEST_SECRET") {
        settings.ingest.shared_secret = Some(v);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = reader.string("RELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = reader.string("RELAY_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => warn!(key = "RELAY_LOG_FORMAT", value = %v, "unknown log format, ignoring"),
        }
    }
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(settings: &RelaySettings) -> Result<()> {
    let server = &settings.server;
    if server.max_connections == 0 {
        return Err(SettingsError::InvalidValue(
            "server.maxConnections must be at least 1".into(),
        ));
    }
    if server.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "server.sendQueueCapacity must be at least 1".into(),
        ));
    }
    if server.heartbeat_interval_secs == 0 {
        return Err(SettingsError::InvalidValue(
            "server.heartbeatIntervalSecs must be at least 1".into(),
        ));
    }
    if server.heartbeat_timeout_secs < server.heartbeat_interval_secs {
        return Err(SettingsError::InvalidValue(format!(
            "server.heartbeatTimeoutSecs ({}) must not be shorter than heartbeatIntervalSecs ({})",
            server.heartbeat_timeout_secs, server.heartbeat_interval_secs
        )));
    }
    if settings.auth.verify_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue(
            "auth.verifyTimeoutMs must be at least 1".into(),
        ));
    }
    if settings.auth.dev_token.is_empty() {
        return Err(SettingsError::InvalidValue(
            "auth.devToken must not be empty".into(),
        ));
    }
    if let Some(jwt) = &settings.auth.jwt {
        if jwt.secret.is_some() && jwt.public_key_path.is_some() {
            return Err(SettingsError::InvalidValue(
                "auth.jwt accepts either a secret or a publicKeyPath, not both".into(),
            ));
        }
    }
    Ok(())
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn parse_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.trim().to_lowercase().as_str() {
        "compact" | "text" | "pretty" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

// ── Env reader ──────────────────────────────────────────────────────────────

struct EnvReader<F> {
    env: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = self.string(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = self.string(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
