//! Read-only data sources over the key space.
//!
//! Data sources read straight from the store without taking key locks.

use serde::{Deserialize, Serialize};

use etcd_reconcile_core::{validate_key, ExternalId};

use crate::context::ReconcileContext;
use crate::error::{
    DuringExt, Operation, OperationError, ReconcileError, ResourceKind, Result, StoreCall,
};
use crate::key::KeyState;

/// One entry returned by a prefix read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPrefixState {
    pub id: ExternalId,
    pub prefix: String,
    /// Ordered by key.
    pub entries: Vec<KeyEntry>,
}

/// Looks up a single key with its revision metadata.
pub struct KeyData {
    ctx: ReconcileContext,
}

impl KeyData {
    pub const NAME: &'static str = "key";

    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    pub async fn read(&self, key: &str) -> Result<KeyState, OperationError> {
        self.lookup(key)
            .await
            .during(Operation::ReadData(Self::NAME))
    }

    async fn lookup(&self, key: &str) -> Result<KeyState> {
        validate_key(key)?;
        let resp = self
            .ctx
            .call(StoreCall::Get, self.ctx.store.get(key.as_bytes()))
            .await?;

        let kv = resp
            .first()
            .ok_or_else(|| ReconcileError::not_found(ResourceKind::Key, key))?;
        Ok(KeyState {
            id: ExternalId::mint(),
            key: kv.key_str(),
            value: kv.value_str(),
            create_revision: kv.create_revision,
            mod_revision: kv.mod_revision,
            version: kv.version,
        })
    }
}

/// Lists every key under a prefix.
pub struct KeyPrefixData {
    ctx: ReconcileContext,
}

impl KeyPrefixData {
    pub const NAME: &'static str = "keyprefix";

    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    pub async fn read(&self, prefix: &str) -> Result<KeyPrefixState, OperationError> {
        self.list(prefix)
            .await
            .during(Operation::ReadData(Self::NAME))
    }

    async fn list(&self, prefix: &str) -> Result<KeyPrefixState> {
        let resp = self
            .ctx
            .call(
                StoreCall::GetWithPrefix,
                self.ctx.store.get_with_prefix(prefix.as_bytes()),
            )
            .await?;

        if resp.is_empty() {
            return Err(ReconcileError::not_found(ResourceKind::Key, format!("{prefix}*")));
        }

        let entries: Vec<KeyEntry> = resp
            .kvs
            .iter()
            .map(|kv| KeyEntry {
                key: kv.key_str(),
                value: kv.value_str(),
            })
            .collect();
        tracing::debug!(prefix, entries = entries.len(), "prefix listed");

        Ok(KeyPrefixState {
            id: ExternalId::mint(),
            prefix: prefix.to_string(),
            entries,
        })
    }
}
