//! Strongly-typed identifiers used across the pipeline.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identity of the caller that submitted an intent.
///
/// Opaque at this layer: the authentication layer decides what a caller id
/// looks like (usually a UUID string issued by the identity provider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CallerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CallerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of an organization (the authorization boundary).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(i64);

impl OrganizationId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<i64> for OrganizationId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for OrganizationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("OrganizationId: {e}")))
    }
}

/// Identifier of a record created by the pipeline (jobs, journal entries, rows).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| DomainError::invalid_id(format!("RecordId: {e}")))?;
        Ok(Self(uuid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_id_parses_trimmed_numbers() {
        assert_eq!("  42 ".parse::<OrganizationId>().unwrap(), OrganizationId::new(42));
        assert!(matches!(
            "acme".parse::<OrganizationId>(),
            Err(DomainError::InvalidId(_))
        ));
    }

    #[test]
    fn record_ids_are_time_ordered() {
        let a = RecordId::new();
        let b = RecordId::new();
        assert!(a.as_uuid() <= b.as_uuid());
    }

    #[test]
    fn caller_id_serializes_transparently() {
        let caller = CallerId::new("user-1");
        assert_eq!(serde_json::to_string(&caller).unwrap(), "\"user-1\"");
    }
}
