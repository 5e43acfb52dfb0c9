//! Settings type tree.
//!
//! All structs use `#[serde(default)]` so a partial JSON file only needs to
//! name the keys it changes. Keys are camelCase on the wire.

mod auth;
mod server;

pub use auth::{AuthMode, AuthSettings, JwtSettings};
pub use server::{IngestSettings, LogFormat, LoggingSettings, OriginSettings, ServerSettings};

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Schema version of the settings file.
    pub version: String,
    /// Service name reported by the status endpoint.
    pub name: String,
    /// Listener and connection limits.
    pub server: ServerSettings,
    /// Handshake authentication.
    pub auth: AuthSettings,
    /// Browser origin allow-list.
    pub origins: OriginSettings,
    /// Ingestion endpoint trust.
    pub ingest: IngestSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            name: "logrelay".to_string(),
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            origins: OriginSettings::default(),
            ingest: IngestSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert_eq!(json["name"], "logrelay");
        assert_eq!(json["server"]["port"], 3001);
        assert_eq!(json["auth"]["mode"], "strict");
        let back: RelaySettings = serde_json::from_value(json).unwrap();
        assert_eq!(back.server.port, 3001);
    }

    #[test]
    fn empty_object_is_all_defaults() {
        let s: RelaySettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.version, "1");
        assert_eq!(s.auth.mode, AuthMode::Strict);
        assert_eq!(s.origins.allowed.len(), 4);
        assert!(s.ingest.shared_secret.is_none());
    }
}
