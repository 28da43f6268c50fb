//! Provider: one configured reconciler handing out resources and data sources.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use etcd_reconcile_store::{LockService, Store, StoreError};

use crate::config::{ConnectionPlan, ProviderConfig};
use crate::context::{ReconcileContext, Settings};
use crate::data::{KeyData, KeyPrefixData};
use crate::key::KeyResource;
use crate::permission::PermissionResource;
use crate::role::RoleResource;
use crate::user::UserResource;

/// Store and lock handles produced by a [`Connector`].
#[derive(Clone)]
pub struct Connection {
    pub store: Arc<dyn Store>,
    pub locks: Arc<dyn LockService>,
}

/// Turns a connection plan into live handles.
///
/// The transport and auth handshake live behind this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        plan: &ConnectionPlan,
        dial_timeout: Duration,
    ) -> std::result::Result<Connection, StoreError>;
}

#[derive(Clone)]
pub struct Provider {
    ctx: ReconcileContext,
}

impl Provider {
    pub fn new(store: Arc<dyn Store>, locks: Arc<dyn LockService>, settings: Settings) -> Self {
        Self {
            ctx: ReconcileContext::new(store, locks, settings),
        }
    }

    /// Resolve `config` and connect through `connector`.
    pub async fn from_config(
        config: &ProviderConfig,
        connector: &dyn Connector,
    ) -> anyhow::Result<Self> {
        let plan = config.connection_plan();
        tracing::info!(
            endpoints = ?plan.endpoints(),
            authenticated = plan.is_authenticated(),
            "connecting to store"
        );

        let connection = connector
            .connect(&plan, config.dial_timeout())
            .await
            .with_context(|| format!("connecting to {}", plan.endpoints().join(",")))?;

        Ok(Self::new(
            connection.store,
            connection.locks,
            Settings::from(config),
        ))
    }

    pub fn context(&self) -> &ReconcileContext {
        &self.ctx
    }

    pub fn keys(&self) -> KeyResource {
        KeyResource::new(self.ctx.clone())
    }

    pub fn roles(&self) -> RoleResource {
        RoleResource::new(self.ctx.clone())
    }

    pub fn users(&self) -> UserResource {
        UserResource::new(self.ctx.clone())
    }

    pub fn permissions(&self) -> PermissionResource {
        PermissionResource::new(self.ctx.clone())
    }

    pub fn key_data(&self) -> KeyData {
        KeyData::new(self.ctx.clone())
    }

    pub fn key_prefix_data(&self) -> KeyPrefixData {
        KeyPrefixData::new(self.ctx.clone())
    }
}
