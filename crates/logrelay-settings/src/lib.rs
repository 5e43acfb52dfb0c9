//! # logrelay-settings
//!
//! Layered configuration for the log relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.logrelay/settings.json` or `--config <path>`
//! 3. **Environment variables**: `RELAY_*` overrides (highest priority)
//!
//! Secrets (`auth.jwt.secret`, `ingest.sharedSecret`) are never serialized
//! back out and are redacted from `Debug` output.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path,
    load_settings_with_env, settings_path, validate,
};
pub use types::*;
