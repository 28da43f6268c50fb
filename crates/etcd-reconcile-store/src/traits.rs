//! Store trait: the key-value and RBAC calls the reconciler makes.
//!
//! The method set mirrors the etcd v3 client: plain range reads and writes,
//! plus the auth admin API for roles and users.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A key-value pair with its revision metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: Bytes,
    pub value: Bytes,
    /// Store revision at which the key was created.
    pub create_revision: i64,
    /// Store revision of the last modification.
    pub mod_revision: i64,
    /// Number of writes since creation.
    pub version: i64,
}

impl KeyValue {
    /// Key as text; invalid UTF-8 is replaced.
    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }

    /// Value as text; invalid UTF-8 is replaced.
    pub fn value_str(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// Result of a range read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetResponse {
    /// Number of keys in the range.
    pub count: usize,
    pub kvs: Vec<KeyValue>,
}

impl GetResponse {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn first(&self) -> Option<&KeyValue> {
        self.kvs.first()
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResponse {
    /// Number of keys removed (0 when the key was absent).
    pub deleted: usize,
}

/// Permission type as stored by the RBAC subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermType {
    Read,
    Write,
    ReadWrite,
}

impl fmt::Display for PermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PermType::Read => "READ",
            PermType::Write => "WRITE",
            PermType::ReadWrite => "READWRITE",
        })
    }
}

/// A permission over the key range `[key, range_end)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangePermission {
    pub perm_type: PermType,
    pub key: Bytes,
    pub range_end: Bytes,
}

impl RangePermission {
    pub fn new(perm_type: PermType, key: impl Into<Bytes>, range_end: impl Into<Bytes>) -> Self {
        Self {
            perm_type,
            key: key.into(),
            range_end: range_end.into(),
        }
    }

    /// Whether this permission covers exactly `[key, range_end)`.
    pub fn covers(&self, key: &[u8], range_end: &[u8]) -> bool {
        self.key.as_ref() == key && self.range_end.as_ref() == range_end
    }
}

/// A role and the permissions it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub name: String,
    pub permissions: Vec<RangePermission>,
}

/// A user and the roles bound to it. Credentials are never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub roles: Vec<String>,
}

/// The Store trait: async interface to the distributed KV store.
///
/// Implementations must be shareable across tasks; the reconciler holds an
/// `Arc<dyn Store>` and never a global client. Absence of a role or user is
/// reported as [`StoreError::RoleNotFound`](crate::StoreError::RoleNotFound) /
/// [`StoreError::UserNotFound`](crate::StoreError::UserNotFound); absence of a
/// key is an empty [`GetResponse`].
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Key-Value Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Read a single key.
    async fn get(&self, key: &[u8]) -> Result<GetResponse>;

    /// Read every key that starts with `prefix`, ordered by key.
    async fn get_with_prefix(&self, prefix: &[u8]) -> Result<GetResponse>;

    /// Write a key, creating it if absent.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key. Deleting an absent key succeeds with `deleted == 0`.
    async fn delete(&self, key: &[u8]) -> Result<DeleteResponse>;

    // ─────────────────────────────────────────────────────────────────────────
    // Role Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn role_add(&self, name: &str) -> Result<()>;

    async fn role_get(&self, name: &str) -> Result<RoleInfo>;

    async fn role_delete(&self, name: &str) -> Result<()>;

    /// Grant a range permission. Re-granting the same range replaces its type.
    async fn role_grant_permission(&self, name: &str, permission: RangePermission) -> Result<()>;

    /// Revoke the permission on exactly `[key, range_end)`.
    async fn role_revoke_permission(&self, name: &str, key: &[u8], range_end: &[u8])
        -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // User Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn user_add(&self, name: &str, password: &str) -> Result<()>;

    async fn user_get(&self, name: &str) -> Result<UserInfo>;

    async fn user_delete(&self, name: &str) -> Result<()>;

    async fn user_change_password(&self, name: &str, password: &str) -> Result<()>;
}
