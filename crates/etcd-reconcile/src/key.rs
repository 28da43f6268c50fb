//! Key resource: a single key path and its value.
//!
//! Every store access runs under the key's lock (see [`crate::lock`]), so
//! reconcilers sharing a lock service never interleave their reads and
//! writes of the same key. Writers that bypass the reconciler are not
//! serialized.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use etcd_reconcile_core::{validate_key, ExternalId};
use etcd_reconcile_store::KeyValue;

use crate::context::ReconcileContext;
use crate::error::{
    DuringExt, Operation, OperationError, ReconcileError, ResourceKind, Result, StoreCall,
};
use crate::lock::with_key_lock;
use crate::resource::Resource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDesired {
    pub key: String,
    pub value: String,
}

impl KeyDesired {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A key as last observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyState {
    pub id: ExternalId,
    pub key: String,
    pub value: String,
    pub create_revision: i64,
    pub mod_revision: i64,
    pub version: i64,
}

impl KeyState {
    fn observed(kv: &KeyValue) -> Self {
        Self {
            id: ExternalId::mint(),
            key: kv.key_str(),
            value: kv.value_str(),
            create_revision: kv.create_revision,
            mod_revision: kv.mod_revision,
            version: kv.version,
        }
    }
}

pub struct KeyResource {
    ctx: ReconcileContext,
}

impl KeyResource {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    async fn fetch(&self, key: &str) -> Result<Option<KeyValue>> {
        let resp = self
            .ctx
            .call(StoreCall::Get, self.ctx.store.get(key.as_bytes()))
            .await?;
        Ok(resp.kvs.into_iter().next())
    }

    async fn put(&self, desired: &KeyDesired) -> Result<()> {
        self.ctx
            .call(
                StoreCall::Put,
                self.ctx
                    .store
                    .put(desired.key.as_bytes(), desired.value.as_bytes()),
            )
            .await
    }

    async fn create_key(&self, desired: &KeyDesired) -> Result<KeyState> {
        validate_key(&desired.key)?;

        with_key_lock(&self.ctx, &desired.key, || async {
            if self.fetch(&desired.key).await?.is_some() {
                return Err(ReconcileError::AlreadyExists {
                    kind: ResourceKind::Key,
                    name: desired.key.clone(),
                });
            }
            self.put(desired).await
        })
        .await?;

        tracing::info!(key = %desired.key, "key created");
        self.read_key(&desired.key).await
    }

    async fn read_key(&self, key: &str) -> Result<KeyState> {
        validate_key(key)?;

        let kv = with_key_lock(&self.ctx, key, || self.fetch(key)).await?;
        kv.as_ref()
            .map(KeyState::observed)
            .ok_or_else(|| ReconcileError::not_found(ResourceKind::Key, key))
    }

    async fn update_key(&self, prior: &KeyState, desired: &KeyDesired) -> Result<KeyState> {
        if desired.key != prior.key {
            return Err(ReconcileError::Configuration(format!(
                "key path cannot change from {:?} to {:?}; replace the resource instead",
                prior.key, desired.key
            )));
        }
        if desired.value == prior.value {
            tracing::debug!(key = %desired.key, "value unchanged, nothing to write");
            return Ok(prior.clone());
        }

        with_key_lock(&self.ctx, &desired.key, || async {
            if self.fetch(&desired.key).await?.is_none() {
                return Err(ReconcileError::not_found(ResourceKind::Key, &desired.key));
            }
            self.put(desired).await
        })
        .await?;

        tracing::info!(key = %desired.key, "key updated");
        self.read_key(&desired.key).await
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let resp = with_key_lock(&self.ctx, key, || async {
            self.ctx
                .call(StoreCall::Delete, self.ctx.store.delete(key.as_bytes()))
                .await
        })
        .await?;

        if resp.deleted == 0 {
            tracing::debug!(key, "key already absent");
        } else {
            tracing::info!(key, "key deleted");
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for KeyResource {
    const KIND: ResourceKind = ResourceKind::Key;
    type Desired = KeyDesired;
    type State = KeyState;

    async fn create(&self, desired: &KeyDesired) -> Result<KeyState, OperationError> {
        self.create_key(desired)
            .await
            .during(Operation::Create(Self::KIND))
    }

    async fn read(&self, key: &str) -> Result<KeyState, OperationError> {
        self.read_key(key).await.during(Operation::Read(Self::KIND))
    }

    async fn update(
        &self,
        prior: &KeyState,
        desired: &KeyDesired,
    ) -> Result<KeyState, OperationError> {
        self.update_key(prior, desired)
            .await
            .during(Operation::Update(Self::KIND))
    }

    async fn delete(&self, state: &KeyState) -> Result<(), OperationError> {
        self.delete_key(&state.key)
            .await
            .during(Operation::Delete(Self::KIND))
    }

    async fn import(&self, key: &str) -> Result<KeyState, OperationError> {
        self.read_key(key).await.during(Operation::Import(Self::KIND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use etcd_reconcile_store::{MemoryLockService, MemoryStore, Store};

    use crate::context::Settings;

    fn resource() -> (KeyResource, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ctx = ReconcileContext::new(
            store.clone(),
            Arc::new(MemoryLockService::new()),
            Settings::default(),
        );
        (KeyResource::new(ctx), store)
    }

    #[tokio::test]
    async fn test_create_existing_key_fails() {
        let (keys, store) = resource();
        store.put(b"/a", b"old").await.unwrap();

        let err = keys.create(&KeyDesired::new("/a", "new")).await.unwrap_err();
        assert_eq!(err.summary(), "Failed creating resource key");
        assert!(matches!(err.error, ReconcileError::AlreadyExists { .. }));
        assert_eq!(store.get(b"/a").await.unwrap().first().unwrap().value_str(), "old");
    }

    #[tokio::test]
    async fn test_update_unchanged_value_makes_no_calls() {
        let (keys, store) = resource();
        let state = keys.create(&KeyDesired::new("/a", "v")).await.unwrap();
        let revision = store.revision().await;

        let same = keys.update(&state, &KeyDesired::new("/a", "v")).await.unwrap();
        assert_eq!(same, state);
        assert_eq!(store.revision().await, revision);
    }

    #[tokio::test]
    async fn test_update_missing_key_says_missing() {
        let (keys, store) = resource();
        let state = keys.create(&KeyDesired::new("/a", "v")).await.unwrap();
        store.delete(b"/a").await.unwrap();

        let err = keys.update(&state, &KeyDesired::new("/a", "w")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.detail().contains("missing"), "{}", err.detail());
    }

    #[tokio::test]
    async fn test_key_path_change_is_configuration_error() {
        let (keys, _) = resource();
        let state = keys.create(&KeyDesired::new("/a", "v")).await.unwrap();
        let err = keys.update(&state, &KeyDesired::new("/b", "v")).await.unwrap_err();
        assert!(matches!(err.error, ReconcileError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_empty_key_rejected_before_store() {
        let (keys, store) = resource();
        let err = keys.create(&KeyDesired::new("", "v")).await.unwrap_err();
        assert!(matches!(err.error, ReconcileError::Configuration(_)));
        assert_eq!(store.revision().await, 0);
    }
}
