//! Strongly typed identifiers.
//!
//! Newtype wrappers around the raw id representations so a batch id can
//! never be passed where a provider zone id is expected (and vice versa).

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error type for id parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse {id_type}: {message}")]
pub struct ParseIdError {
    /// The type of id that failed to parse.
    pub id_type: &'static str,
    /// The underlying parse error message.
    pub message: String,
}

/// Macro to define a uuid-backed id type.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an id from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    message: e.to_string(),
                })
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Strongly typed identifier for an import/commit batch.
    ///
    /// One batch spans delta check, staging, approval and commit for a single
    /// import run.
    BatchId
);

/// Opaque provider-issued zone identifier.
///
/// Navio ids are strings and must be treated as opaque; they are the stable
/// key that links snapshot rows, staging areas and production areas back to
/// the upstream zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderZoneId(String);

impl ProviderZoneId {
    /// Wrap a raw provider id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id as delivered by the provider.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderZoneId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProviderZoneId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProviderZoneId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_ids_are_unique() {
        assert_ne!(BatchId::new(), BatchId::new());
    }

    #[test]
    fn batch_id_parse_round_trip() {
        let id = BatchId::new();
        let parsed: BatchId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn batch_id_parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<BatchId>().unwrap_err();
        assert_eq!(err.id_type, "BatchId");
        assert!(err.to_string().starts_with("Failed to parse BatchId:"));
    }

    #[test]
    fn provider_zone_id_is_opaque() {
        let id = ProviderZoneId::new("navio-4711");
        assert_eq!(id.as_str(), "navio-4711");
        assert_eq!(id, ProviderZoneId::from("navio-4711"));
    }
}
