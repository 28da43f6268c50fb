//! Grant requests and their range-permission encoding.
//!
//! Encoding turns a [`GrantRequest`] into the [`RangePermission`] the store
//! understands. Decoding goes the other way for a role's permission list:
//! entries are matched by exact key, and prefix mode is inferred by
//! recomputing the prefix bound and comparing it with the stored range end.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use etcd_reconcile_core::prefix_range_end;
use etcd_reconcile_store::{PermType, RangePermission};

use crate::error::{PermsError, Result};
use crate::kind::PermissionKind;

/// Desired grant of a capability over a key range to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRequest {
    pub role: String,
    pub key: String,
    /// Compute the range end from `key` instead of taking `range_end`.
    pub with_prefix: bool,
    /// Explicit range end; required when `with_prefix` is false.
    pub range_end: Option<String>,
    pub kind: PermissionKind,
}

impl GrantRequest {
    /// Grant over every key under `key`.
    pub fn prefix(role: impl Into<String>, key: impl Into<String>, kind: PermissionKind) -> Self {
        Self {
            role: role.into(),
            key: key.into(),
            with_prefix: true,
            range_end: None,
            kind,
        }
    }

    /// Grant over `[key, range_end)`.
    pub fn range(
        role: impl Into<String>,
        key: impl Into<String>,
        range_end: impl Into<String>,
        kind: PermissionKind,
    ) -> Self {
        Self {
            role: role.into(),
            key: key.into(),
            with_prefix: false,
            range_end: Some(range_end.into()),
            kind,
        }
    }

    /// The range end this request resolves to.
    pub fn effective_range_end(&self) -> Result<Vec<u8>> {
        let explicit = self.range_end.as_deref().filter(|end| !end.is_empty());

        if self.with_prefix {
            let computed = prefix_range_end(self.key.as_bytes());
            return match explicit {
                Some(end) if end.as_bytes() != computed.as_slice() => {
                    Err(PermsError::ConflictingRangeEnd {
                        key: self.key.clone(),
                        range_end: end.to_string(),
                    })
                }
                _ => Ok(computed),
            };
        }

        explicit
            .map(|end| end.as_bytes().to_vec())
            .ok_or_else(|| PermsError::MissingRangeEnd {
                key: self.key.clone(),
            })
    }

    /// Check the request without encoding it.
    pub fn validate(&self) -> Result<()> {
        if self.role.is_empty() {
            return Err(PermsError::EmptyRole);
        }
        if self.key.is_empty() {
            return Err(PermsError::EmptyKey);
        }
        self.effective_range_end().map(|_| ())
    }

    /// Encode into the store's range permission.
    pub fn encode(&self) -> Result<RangePermission> {
        self.validate()?;
        let range_end = self.effective_range_end()?;
        Ok(RangePermission {
            perm_type: self.kind.to_perm_type(),
            key: Bytes::copy_from_slice(self.key.as_bytes()),
            range_end: Bytes::from(range_end),
        })
    }
}

/// A stored permission as read back from a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedPermission {
    pub key: String,
    pub range_end: String,
    /// Whether the stored range end is the prefix bound of the key.
    pub with_prefix: bool,
    pub kind: PermissionKind,
    /// The type exactly as stored, kept for write-only grants.
    pub stored_type: PermType,
}

impl ObservedPermission {
    pub fn from_range(permission: &RangePermission) -> Self {
        let with_prefix =
            permission.range_end.as_ref() == prefix_range_end(&permission.key).as_slice();
        Self {
            key: String::from_utf8_lossy(&permission.key).into_owned(),
            range_end: String::from_utf8_lossy(&permission.range_end).into_owned(),
            with_prefix,
            kind: PermissionKind::from_perm_type(permission.perm_type),
            stored_type: permission.perm_type,
        }
    }

    /// Rebuild a grant request for `role` that reproduces this permission.
    pub fn to_request(&self, role: impl Into<String>) -> GrantRequest {
        GrantRequest {
            role: role.into(),
            key: self.key.clone(),
            with_prefix: self.with_prefix,
            range_end: (!self.with_prefix).then(|| self.range_end.clone()),
            kind: self.kind,
        }
    }
}

/// Copy a stored permission for another role.
///
/// Key and range end are kept byte for byte, so single-key grants (empty
/// range end) survive. Only the type is translated through
/// [`PermissionKind`], which turns write-only grants into `Read`.
pub fn reissue(permission: &RangePermission) -> RangePermission {
    RangePermission {
        perm_type: PermissionKind::from_perm_type(permission.perm_type).to_perm_type(),
        key: permission.key.clone(),
        range_end: permission.range_end.clone(),
    }
}

/// Decode the first permission whose key is exactly `key`.
pub fn decode(permissions: &[RangePermission], key: &str) -> Option<ObservedPermission> {
    permissions
        .iter()
        .find(|p| p.key.as_ref() == key.as_bytes())
        .map(ObservedPermission::from_range)
}

/// Decode every permission of a role.
pub fn decode_all(permissions: &[RangePermission]) -> Vec<ObservedPermission> {
    permissions.iter().map(ObservedPermission::from_range).collect()
}

/// Permissions covering exactly `[key, range_end)`.
pub fn matching<'a>(
    permissions: &'a [RangePermission],
    key: &'a [u8],
    range_end: &'a [u8],
) -> impl Iterator<Item = &'a RangePermission> + 'a {
    permissions.iter().filter(move |p| p.covers(key, range_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_prefix_encoding() {
        let permission = GrantRequest::prefix("r", "/app/", PermissionKind::ReadWrite)
            .encode()
            .unwrap();
        assert_eq!(permission.key.as_ref(), b"/app/");
        assert_eq!(permission.range_end.as_ref(), b"/app0");
        assert_eq!(permission.perm_type, PermType::ReadWrite);
    }

    #[test]
    fn test_explicit_range_encoding() {
        let permission = GrantRequest::range("r", "/a", "/b", PermissionKind::Read)
            .encode()
            .unwrap();
        assert_eq!(permission.range_end.as_ref(), b"/b");
        assert_eq!(permission.perm_type, PermType::Read);
    }

    #[test]
    fn test_missing_range_end_is_configuration_error() {
        let mut request = GrantRequest::range("r", "/a", "", PermissionKind::Read);
        assert_eq!(
            request.encode(),
            Err(PermsError::MissingRangeEnd { key: "/a".into() })
        );
        request.range_end = None;
        assert!(matches!(
            request.encode(),
            Err(PermsError::MissingRangeEnd { .. })
        ));
    }

    #[test]
    fn test_prefix_with_conflicting_end_rejected() {
        let mut request = GrantRequest::prefix("r", "/app/", PermissionKind::Read);
        request.range_end = Some("/zzz".into());
        assert!(matches!(
            request.encode(),
            Err(PermsError::ConflictingRangeEnd { .. })
        ));

        request.range_end = Some("/app0".into());
        assert!(request.encode().is_ok());
    }

    #[test]
    fn test_empty_role_and_key_rejected() {
        assert_eq!(
            GrantRequest::prefix("", "/a", PermissionKind::Read).encode(),
            Err(PermsError::EmptyRole)
        );
        assert_eq!(
            GrantRequest::prefix("r", "", PermissionKind::Read).encode(),
            Err(PermsError::EmptyKey)
        );
    }

    #[test]
    fn test_decode_infers_prefix_mode() {
        let permissions = vec![
            RangePermission::new(PermType::Read, "/app/", "/app0"),
            RangePermission::new(PermType::ReadWrite, "/a", "/b"),
        ];

        let prefixed = decode(&permissions, "/app/").unwrap();
        assert!(prefixed.with_prefix);
        assert_eq!(prefixed.kind, PermissionKind::Read);

        let ranged = decode(&permissions, "/a").unwrap();
        assert!(!ranged.with_prefix);
        assert_eq!(ranged.range_end, "/b");
        assert_eq!(ranged.kind, PermissionKind::ReadWrite);

        assert!(decode(&permissions, "/missing").is_none());
    }

    #[test]
    fn test_observed_to_request_reproduces_permission() {
        let stored = RangePermission::new(PermType::Write, "/a", "/b");
        let observed = ObservedPermission::from_range(&stored);
        assert_eq!(observed.stored_type, PermType::Write);

        // Write-only collapses to READ when copied.
        let copied = observed.to_request("r2").encode().unwrap();
        assert_eq!(copied.perm_type, PermType::Read);
        assert!(copied.covers(b"/a", b"/b"));
    }

    #[test]
    fn test_reissue_keeps_single_key_grant() {
        let single = RangePermission::new(PermType::Write, "/only", "");
        let copied = reissue(&single);
        assert_eq!(copied.key.as_ref(), b"/only");
        assert!(copied.range_end.is_empty());
        assert_eq!(copied.perm_type, PermType::Read);

        let rw = RangePermission::new(PermType::ReadWrite, "/app/", "/app0");
        assert_eq!(reissue(&rw), rw);
    }

    #[test]
    fn test_matching_filters_exact_range() {
        let permissions = vec![
            RangePermission::new(PermType::Read, "/a", "/b"),
            RangePermission::new(PermType::Read, "/a", "/c"),
        ];
        let hits: Vec<_> = matching(&permissions, b"/a", b"/c").collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].range_end.as_ref(), b"/c");
    }

    proptest! {
        #[test]
        fn prefix_grants_decode_as_prefix(key in "/[a-z]{1,8}/?") {
            let permission = GrantRequest::prefix("r", key.clone(), PermissionKind::Read)
                .encode()
                .unwrap();
            let observed = decode(&[permission], &key).unwrap();
            prop_assert!(observed.with_prefix);
        }
    }
}
