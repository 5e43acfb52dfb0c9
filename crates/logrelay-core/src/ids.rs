//! Branded ID newtypes.
//!
//! [`ConnectionId`] is generated by the relay (UUID v7, time-ordered, with a
//! `conn_` prefix). [`DeploymentId`] is supplied by callers and is never
//! generated here.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id! {
    /// Unique identifier for one live WebSocket session.
    ConnectionId, "conn"
}

/// Key of a deployment room.
///
/// Opaque to the relay. Producers and browsers may send it either as a JSON
/// string or as a JSON number; numbers are normalized to their decimal text so
/// that `42` and `"42"` address the same room.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Build a deployment ID from a JSON value.
    ///
    /// Returns `None` for null, empty strings, booleans, arrays and objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(number_text(n))),
            _ => None,
        }
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Decimal text of a JSON number. Whole floats print without a fraction, so
/// `42.0` and `42` name the same room.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f + 0.0),
        _ => n.to_string(),
    }
}

impl<'de> Deserialize<'de> for DeploymentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| D::Error::custom("deployment id must be a non-empty string or a number"))
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeploymentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeploymentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<u64> for DeploymentId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_id_has_prefix() {
        let id = ConnectionId::new();
        assert!(id.as_str().starts_with("conn_"), "got: {id}");
    }

    #[test]
    fn connection_id_suffix_is_uuid_v7() {
        let id = ConnectionId::new();
        let raw = id.as_str().trim_start_matches("conn_");
        let parsed = Uuid::parse_str(raw).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn deployment_id_from_string() {
        let id = DeploymentId::from_value(&json!("dep-7")).unwrap();
        assert_eq!(id.as_str(), "dep-7");
    }

    #[test]
    fn deployment_id_number_matches_string() {
        let from_num = DeploymentId::from_value(&json!(42)).unwrap();
        let from_str = DeploymentId::from_value(&json!("42")).unwrap();
        assert_eq!(from_num, from_str);
        assert_eq!(from_num, DeploymentId::from(42_u64));
    }

    #[test]
    fn deployment_id_whole_float_matches_integer() {
        let from_float: DeploymentId = serde_json::from_str("42.0").unwrap();
        assert_eq!(from_float, DeploymentId::from(42_u64));
        let exponent: DeploymentId = serde_json::from_str("1e3").unwrap();
        assert_eq!(exponent.as_str(), "1000");
        let negative_zero: DeploymentId = serde_json::from_str("-0.0").unwrap();
        assert_eq!(negative_zero.as_str(), "0");
    }

    #[test]
    fn deployment_id_fractional_float_keeps_fraction() {
        let id: DeploymentId = serde_json::from_str("1.5").unwrap();
        assert_eq!(id.as_str(), "1.5");
    }

    #[test]
    fn deployment_id_zero_is_accepted() {
        let id = DeploymentId::from_value(&json!(0)).unwrap();
        assert_eq!(id.as_str(), "0");
    }

    #[test]
    fn deployment_id_rejects_empty_and_non_scalars() {
        assert!(DeploymentId::from_value(&json!("")).is_none());
        assert!(DeploymentId::from_value(&Value::Null).is_none());
        assert!(DeploymentId::from_value(&json!(true)).is_none());
        assert!(DeploymentId::from_value(&json!([1])).is_none());
        assert!(DeploymentId::from_value(&json!({"id": 1})).is_none());
    }

    #[test]
    fn deployment_id_deserializes_from_number() {
        #[derive(Deserialize)]
        struct Body {
            id: DeploymentId,
        }
        let body: Body = serde_json::from_str(r#"{"id": 1234}"#).unwrap();
        assert_eq!(body.id.as_str(), "1234");
    }

    #[test]
    fn deployment_id_deserialize_rejects_null() {
        let result: Result<DeploymentId, _> = serde_json::from_str("null");
        assert!(result.is_err());
    }

    #[test]
    fn deployment_id_serializes_as_string() {
        let json = serde_json::to_string(&DeploymentId::from(9_u64)).unwrap();
        assert_eq!(json, "\"9\"");
    }
}
