//! Peer identity: the stable identifier of a remote device.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a remote device, typically its link-layer address.
///
/// The value is opaque to the core: it is compared byte-for-byte and used as
/// the key for all per-peer state (challenges, failure counters, lockouts,
/// whitelist entries).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerIdentity(String);

impl PeerIdentity {
    /// Wraps a raw identifier.  Surrounding whitespace is trimmed.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.len() == id.len() {
            Self(id)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is empty after trimming.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PeerIdentity {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
