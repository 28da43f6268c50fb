//! Proptest generators for property-based testing.

use bytes::Bytes;
use proptest::prelude::*;

use etcd_reconcile_core::prefix_range_end;
use etcd_reconcile_store::{PermType, RangePermission};

/// A slash-separated key path such as `/app/db/host`.
pub fn key_path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9_-]{1,8}", 1..4).prop_map(|parts| format!("/{}", parts.join("/")))
}

/// A key path ending in `/`, the usual shape of a prefix grant.
pub fn key_prefix() -> impl Strategy<Value = String> {
    key_path().prop_map(|path| format!("{path}/"))
}

/// A role or user name.
pub fn name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

/// A value payload; may be empty.
pub fn value() -> impl Strategy<Value = String> {
    "[ -~]{0,32}"
}

/// Anything a user might type as a permission kind.
pub fn kind_input() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("READ".to_string()),
        Just("READ_WRITE".to_string()),
        Just("READWRITE".to_string()),
        "[A-Za-z_]{0,12}",
    ]
}

pub fn perm_type() -> impl Strategy<Value = PermType> {
    prop_oneof![
        Just(PermType::Read),
        Just(PermType::Write),
        Just(PermType::ReadWrite),
    ]
}

/// A stored permission: prefix, explicit range, or single key.
pub fn range_permission() -> impl Strategy<Value = RangePermission> {
    let prefix = (perm_type(), key_prefix()).prop_map(|(t, key)| {
        let end = prefix_range_end(key.as_bytes());
        RangePermission::new(t, key, end)
    });
    let ranged = (perm_type(), key_path(), key_path()).prop_map(|(t, a, b)| {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        RangePermission::new(t, start, end)
    });
    let single = (perm_type(), key_path())
        .prop_map(|(t, key)| RangePermission::new(t, key, Bytes::new()));
    prop_oneof![prefix, ranged, single]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn key_paths_are_absolute(path in key_path()) {
            prop_assert!(path.starts_with('/'));
            prop_assert!(!path.ends_with('/'));
        }

        #[test]
        fn prefixes_end_with_slash(prefix in key_prefix()) {
            prop_assert!(prefix.ends_with('/'));
        }
    }
}
