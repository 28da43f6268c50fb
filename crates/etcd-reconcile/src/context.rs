//! Shared handles for one reconciler instance.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use etcd_reconcile_core::PasswordPolicy;
use etcd_reconcile_store::{LockService, Store, StoreError};

use crate::config::ProviderConfig;
use crate::error::{ReconcileError, Result, StoreCall};

/// Tunables applied to every operation.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Deadline for each individual store call.
    pub request_timeout: Duration,
    /// Policy for passwords generated on user create.
    pub password_policy: PasswordPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(5),
            password_policy: PasswordPolicy::default(),
        }
    }
}

impl From<&ProviderConfig> for Settings {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            ..Self::default()
        }
    }
}

/// Store and lock handles plus settings, cloned into every resource.
#[derive(Clone)]
pub struct ReconcileContext {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) locks: Arc<dyn LockService>,
    pub(crate) settings: Settings,
}

impl ReconcileContext {
    pub fn new(store: Arc<dyn Store>, locks: Arc<dyn LockService>, settings: Settings) -> Self {
        Self {
            store,
            locks,
            settings,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one store call under the request deadline.
    pub(crate) async fn call<T, F>(&self, call: StoreCall, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        let after = self.settings.request_timeout;
        match tokio::time::timeout(after, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ReconcileError::from_store(call, e)),
            Err(_) => {
                tracing::warn!(%call, ?after, "store call timed out");
                Err(ReconcileError::Timeout { call, after })
            }
        }
    }
}
