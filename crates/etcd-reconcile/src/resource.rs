//! The resource surface the orchestrator drives.

use async_trait::async_trait;

use crate::error::{OperationError, ResourceKind};

/// A reconcilable resource kind.
///
/// `read` and `import` locate the resource by its natural key: the key path
/// for keys, the name for roles and users, and `role:key` for permissions.
#[async_trait]
pub trait Resource: Send + Sync {
    const KIND: ResourceKind;

    /// What the orchestrator wants to exist.
    type Desired: Send + Sync;

    /// What was observed in the store.
    type State: Send + Sync;

    async fn create(&self, desired: &Self::Desired) -> Result<Self::State, OperationError>;

    async fn read(&self, natural_key: &str) -> Result<Self::State, OperationError>;

    async fn update(
        &self,
        prior: &Self::State,
        desired: &Self::Desired,
    ) -> Result<Self::State, OperationError>;

    async fn delete(&self, state: &Self::State) -> Result<(), OperationError>;

    /// Adopt an existing object into management.
    async fn import(&self, natural_key: &str) -> Result<Self::State, OperationError>;
}
