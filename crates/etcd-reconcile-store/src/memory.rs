//! In-memory implementation of the Store trait.
//!
//! Follows etcd semantics closely enough for reconciliation tests: a global
//! revision counter, per-key versions, prefix ranges, and RBAC tables. All
//! data is lost when the store is dropped.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use etcd_reconcile_core::KeyRange;

use crate::error::{Result, StoreError};
use crate::traits::{
    DeleteResponse, GetResponse, KeyValue, RangePermission, RoleInfo, Store, UserInfo,
};

/// In-memory store implementation. Thread-safe via an async RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Current store revision; bumped by every mutation of the key space.
    revision: i64,

    /// Key space ordered by raw key bytes.
    kvs: BTreeMap<Vec<u8>, KeyValue>,

    /// Roles and their permissions, ordered by key as etcd returns them.
    roles: BTreeMap<String, Vec<RangePermission>>,

    users: BTreeMap<String, StoredUser>,
}

struct StoredUser {
    /// Only a digest is kept, never the plaintext.
    password_digest: blake3::Hash,
    roles: Vec<String>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Current store revision.
    pub async fn revision(&self) -> i64 {
        self.inner.read().await.revision
    }

    /// Check a user's password against the stored digest.
    pub async fn verify_password(&self, name: &str, password: &str) -> bool {
        let inner = self.inner.read().await;
        inner
            .users
            .get(name)
            .is_some_and(|u| u.password_digest == blake3::hash(password.as_bytes()))
    }

    /// Bind a role to a user.
    pub async fn user_grant_role(&self, user: &str, role: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.roles.contains_key(role) {
            return Err(StoreError::RoleNotFound(role.to_string()));
        }
        let stored = inner
            .users
            .get_mut(user)
            .ok_or_else(|| StoreError::UserNotFound(user.to_string()))?;
        if !stored.roles.iter().any(|r| r == role) {
            stored.roles.push(role.to_string());
            stored.roles.sort();
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &[u8]) -> Result<GetResponse> {
        let inner = self.inner.read().await;
        let kvs: Vec<KeyValue> = inner.kvs.get(key).cloned().into_iter().collect();
        Ok(GetResponse {
            count: kvs.len(),
            kvs,
        })
    }

    async fn get_with_prefix(&self, prefix: &[u8]) -> Result<GetResponse> {
        let inner = self.inner.read().await;
        let range = KeyRange::prefix(prefix);

        let kvs: Vec<KeyValue> = inner
            .kvs
            .range(range.start.clone()..)
            .take_while(|(k, _)| range.contains(k))
            .map(|(_, kv)| kv.clone())
            .collect();

        Ok(GetResponse {
            count: kvs.len(),
            kvs,
        })
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidArgument("key is not provided".into()));
        }

        let mut inner = self.inner.write().await;
        inner.revision += 1;
        let revision = inner.revision;

        match inner.kvs.get_mut(key) {
            Some(kv) => {
                kv.value = Bytes::copy_from_slice(value);
                kv.mod_revision = revision;
                kv.version += 1;
            }
            None => {
                inner.kvs.insert(
                    key.to_vec(),
                    KeyValue {
                        key: Bytes::copy_from_slice(key),
                        value: Bytes::copy_from_slice(value),
                        create_revision: revision,
                        mod_revision: revision,
                        version: 1,
                    },
                );
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> Result<DeleteResponse> {
        let mut inner = self.inner.write().await;
        if inner.kvs.remove(key).is_some() {
            inner.revision += 1;
            return Ok(DeleteResponse { deleted: 1 });
        }
        Ok(DeleteResponse { deleted: 0 })
    }

    async fn role_add(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(StoreError::InvalidArgument("role name is empty".into()));
        }

        let mut inner = self.inner.write().await;
        if inner.roles.contains_key(name) {
            return Err(StoreError::RoleAlreadyExists(name.to_string()));
        }
        inner.roles.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn role_get(&self, name: &str) -> Result<RoleInfo> {
        let inner = self.inner.read().await;
        let permissions = inner
            .roles
            .get(name)
            .ok_or_else(|| StoreError::RoleNotFound(name.to_string()))?;

        Ok(RoleInfo {
            name: name.to_string(),
            permissions: permissions.clone(),
        })
    }

    async fn role_delete(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.roles.remove(name).is_none() {
            return Err(StoreError::RoleNotFound(name.to_string()));
        }

        // Unbind the role from every user, as etcd does.
        for user in inner.users.values_mut() {
            user.roles.retain(|r| r != name);
        }
        Ok(())
    }

    async fn role_grant_permission(&self, name: &str, permission: RangePermission) -> Result<()> {
        let mut inner = self.inner.write().await;
        let permissions = inner
            .roles
            .get_mut(name)
            .ok_or_else(|| StoreError::RoleNotFound(name.to_string()))?;

        match permissions
            .iter_mut()
            .find(|p| p.covers(&permission.key, &permission.range_end))
        {
            Some(existing) => existing.perm_type = permission.perm_type,
            None => {
                permissions.push(permission);
                permissions.sort_by(|a, b| a.key.cmp(&b.key).then(a.range_end.cmp(&b.range_end)));
            }
        }
        Ok(())
    }

    async fn role_revoke_permission(
        &self,
        name: &str,
        key: &[u8],
        range_end: &[u8],
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let permissions = inner
            .roles
            .get_mut(name)
            .ok_or_else(|| StoreError::RoleNotFound(name.to_string()))?;

        let before = permissions.len();
        permissions.retain(|p| !p.covers(key, range_end));
        if permissions.len() == before {
            return Err(StoreError::PermissionNotGranted {
                role: name.to_string(),
                key: String::from_utf8_lossy(key).into_owned(),
            });
        }
        Ok(())
    }

    async fn user_add(&self, name: &str, password: &str) -> Result<()> {
        if name.is_empty() {
            return Err(StoreError::InvalidArgument("user name is empty".into()));
        }

        let mut inner = self.inner.write().await;
        if inner.users.contains_key(name) {
            return Err(StoreError::UserAlreadyExists(name.to_string()));
        }
        inner.users.insert(
            name.to_string(),
            StoredUser {
                password_digest: blake3::hash(password.as_bytes()),
                roles: Vec::new(),
            },
        );
        Ok(())
    }

    async fn user_get(&self, name: &str) -> Result<UserInfo> {
        let inner = self.inner.read().await;
        let user = inner
            .users
            .get(name)
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))?;

        Ok(UserInfo {
            name: name.to_string(),
            roles: user.roles.clone(),
        })
    }

    async fn user_delete(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .users
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))
    }

    async fn user_change_password(&self, name: &str, password: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(name)
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))?;
        user.password_digest = blake3::hash(password.as_bytes());
        Ok(())
    }
}
