//! External identifiers for reconciled resources.
//!
//! An [`ExternalId`] is what the orchestrator stores next to a resource. It is
//! a generation marker: a fresh one is minted every time the resource is
//! observed, so two reads of an unchanged key usually yield different ids.
//! Change detection must compare observed values, never ids.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned to a reconciled resource instance.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    /// Mint a fresh random identifier (UUID v4 layout).
    pub fn mint() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        // version 4, RFC 4122 variant
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;

        let hex = hex::encode(bytes);
        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }

    /// Identifier derived from a natural key (key path, role or user name).
    ///
    /// Used for import and for resources whose identity is their name.
    pub fn from_natural(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the identifier as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id looks like one produced by [`ExternalId::mint`].
    pub fn is_minted(&self) -> bool {
        let parts: Vec<&str> = self.0.split('-').collect();
        let lens: Vec<usize> = parts.iter().map(|p| p.len()).collect();
        lens == [8, 4, 4, 4, 12]
            && parts
                .iter()
                .all(|p| p.chars().all(|c| c.is_ascii_hexdigit()))
    }
}

impl fmt::Debug for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExternalId({})", self.0)
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExternalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
