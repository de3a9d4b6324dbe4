//! Access session ledger entries.
//!
//! A session records an issued access grant keyed by principal + device.
//! Re-authorization for the same key refreshes `expires_at` and keeps the
//! token, so NAS re-checks never create unbounded session rows.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::principal::PrincipalId;

/// Opaque bearer token identifying an issued session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Wrap an existing UUID.
    pub fn from_uuid(token: Uuid) -> Self {
        Self(token)
    }

    /// Generate a fresh token.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validation error raised by [`DeviceId::new`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("device identifier must not be empty")]
pub struct EmptyDeviceId;

/// Device identifier presented by the NAS, typically the client MAC address.
///
/// Normalised to uppercase so the session key is stable across the colon,
/// dash, and case variations access points emit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Validate and normalise a device identifier.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, EmptyDeviceId> {
        let normalised: String = raw
            .as_ref()
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect::<String>()
            .to_uppercase();
        if normalised.is_empty() {
            return Err(EmptyDeviceId);
        }
        Ok(Self(normalised))
    }

    /// Borrow the normalised identifier.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for DeviceId {
    type Error = EmptyDeviceId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

/// Issued access grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessSession {
    /// Bearer token for the grant.
    pub token: SessionToken,
    /// Principal the grant was issued to.
    pub principal: PrincipalId,
    /// Device the grant applies to.
    pub device: DeviceId,
    /// Instant the grant lapses.
    pub expires_at: DateTime<Utc>,
}
