//! Permission kinds and their mapping to stored permission types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use etcd_reconcile_store::PermType;

use crate::error::{PermsError, Result};

/// Capability carried by a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PermissionKind {
    #[default]
    Read,
    ReadWrite,
}

impl PermissionKind {
    /// Parse the kind given on the grant path.
    ///
    /// `READ_WRITE` (or the store's own `READWRITE`) selects read-write;
    /// every other string, including typos and lowercase, becomes `Read`.
    pub fn from_grant_input(input: &str) -> Self {
        match input {
            "READ_WRITE" | "READWRITE" => PermissionKind::ReadWrite,
            "READ" => PermissionKind::Read,
            other => {
                tracing::debug!(kind = other, "unrecognized permission kind, using READ");
                PermissionKind::Read
            }
        }
    }

    /// Parse the kind for schema validation, rejecting unknown strings.
    pub fn parse_strict(input: &str) -> Result<Self> {
        match input {
            "READ" => Ok(PermissionKind::Read),
            "READ_WRITE" | "READWRITE" => Ok(PermissionKind::ReadWrite),
            other => Err(PermsError::UnknownKind(other.to_string())),
        }
    }

    /// Stored permission type for this kind.
    pub fn to_perm_type(self) -> PermType {
        match self {
            PermissionKind::Read => PermType::Read,
            PermissionKind::ReadWrite => PermType::ReadWrite,
        }
    }

    /// Kind for a stored permission type.
    ///
    /// Write-only permissions have no kind of their own and read back as `Read`.
    pub fn from_perm_type(perm_type: PermType) -> Self {
        match perm_type {
            PermType::ReadWrite => PermissionKind::ReadWrite,
            PermType::Read | PermType::Write => PermissionKind::Read,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionKind::Read => "READ",
            PermissionKind::ReadWrite => "READ_WRITE",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = PermsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_strict(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_input_recognizes_both_kinds() {
        assert_eq!(PermissionKind::from_grant_input("READ"), PermissionKind::Read);
        assert_eq!(
            PermissionKind::from_grant_input("READ_WRITE"),
            PermissionKind::ReadWrite
        );
        assert_eq!(
            PermissionKind::from_grant_input("READWRITE"),
            PermissionKind::ReadWrite
        );
    }

    #[test]
    fn test_grant_input_defaults_unknown_to_read() {
        // Lenient on purpose: the grant path never rejects a kind.
        for input in ["WRITE", "read_write", "", "ADMIN"] {
            assert_eq!(PermissionKind::from_grant_input(input), PermissionKind::Read);
        }
    }

    #[test]
    fn test_strict_rejects_unknown() {
        assert_eq!(
            "WRITE".parse::<PermissionKind>(),
            Err(PermsError::UnknownKind("WRITE".into()))
        );
        assert_eq!("READ".parse::<PermissionKind>(), Ok(PermissionKind::Read));
    }

    #[test]
    fn test_perm_type_mapping() {
        assert_eq!(PermissionKind::ReadWrite.to_perm_type(), PermType::ReadWrite);
        assert_eq!(
            PermissionKind::from_perm_type(PermType::ReadWrite),
            PermissionKind::ReadWrite
        );
        assert_eq!(
            PermissionKind::from_perm_type(PermType::Write),
            PermissionKind::Read
        );
    }
}
