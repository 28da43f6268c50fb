//! User resource.
//!
//! Passwords are write-only. The store keeps the credential and never hands
//! it back, so [`UserState::password`] holds only what this process set.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use etcd_reconcile_core::{generate_password, validate_user_name, ExternalId};

use crate::context::ReconcileContext;
use crate::error::{
    DuringExt, Operation, OperationError, ReconcileError, ResourceKind, Result, StoreCall,
};
use crate::resource::Resource;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDesired {
    pub name: String,
    /// Generated on create when absent.
    pub password: Option<String>,
}

impl UserDesired {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for UserDesired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDesired")
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserState {
    pub id: ExternalId,
    pub name: String,
    pub roles: Vec<String>,
    /// Password set by the last create or update; `None` after a plain read.
    pub password: Option<String>,
}

impl fmt::Debug for UserState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("roles", &self.roles)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

pub struct UserResource {
    ctx: ReconcileContext,
}

impl UserResource {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    async fn create_user(&self, desired: &UserDesired) -> Result<UserState> {
        validate_user_name(&desired.name)?;

        let password = match &desired.password {
            Some(password) => password.clone(),
            None => {
                tracing::debug!(user = %desired.name, "generating password");
                generate_password(&self.ctx.settings.password_policy)?
            }
        };
        self.ctx
            .call(
                StoreCall::UserAdd,
                self.ctx.store.user_add(&desired.name, &password),
            )
            .await?;

        tracing::info!(user = %desired.name, "user created");
        let mut state = self.read_user(&desired.name).await?;
        state.password = Some(password);
        Ok(state)
    }

    async fn read_user(&self, name: &str) -> Result<UserState> {
        let info = self
            .ctx
            .call(StoreCall::UserGet, self.ctx.store.user_get(name))
            .await
            .map_err(|e| {
                if e.is_store_absence() {
                    ReconcileError::not_found(ResourceKind::User, name)
                } else {
                    e
                }
            })?;

        Ok(UserState {
            id: ExternalId::mint(),
            name: info.name,
            roles: info.roles,
            password: None,
        })
    }

    async fn update_user(&self, prior: &UserState, desired: &UserDesired) -> Result<UserState> {
        if desired.name != prior.name {
            return Err(ReconcileError::Configuration(format!(
                "user name cannot change from {:?} to {:?}; replace the resource instead",
                prior.name, desired.name
            )));
        }

        let changed = desired
            .password
            .as_deref()
            .filter(|p| prior.password.as_deref() != Some(*p));
        if let Some(password) = changed {
            self.ctx
                .call(
                    StoreCall::UserChangePassword,
                    self.ctx.store.user_change_password(&desired.name, password),
                )
                .await?;
            tracing::info!(user = %desired.name, "password changed");
        }

        let mut state = self.read_user(&desired.name).await?;
        state.password = desired.password.clone().or_else(|| prior.password.clone());
        Ok(state)
    }

    async fn delete_user(&self, name: &str) -> Result<()> {
        self.ctx
            .call(StoreCall::UserDelete, self.ctx.store.user_delete(name))
            .await?;
        tracing::info!(user = name, "user deleted");
        Ok(())
    }
}

#[async_trait]
impl Resource for UserResource {
    const KIND: ResourceKind = ResourceKind::User;
    type Desired = UserDesired;
    type State = UserState;

    async fn create(&self, desired: &UserDesired) -> Result<UserState, OperationError> {
        self.create_user(desired)
            .await
            .during(Operation::Create(Self::KIND))
    }

    async fn read(&self, name: &str) -> Result<UserState, OperationError> {
        self.read_user(name).await.during(Operation::Read(Self::KIND))
    }

    async fn update(
        &self,
        prior: &UserState,
        desired: &UserDesired,
    ) -> Result<UserState, OperationError> {
        self.update_user(prior, desired)
            .await
            .during(Operation::Update(Self::KIND))
    }

    async fn delete(&self, state: &UserState) -> Result<(), OperationError> {
        self.delete_user(&state.name)
            .await
            .during(Operation::Delete(Self::KIND))
    }

    async fn import(&self, name: &str) -> Result<UserState, OperationError> {
        self.read_user(name).await.during(Operation::Import(Self::KIND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use etcd_reconcile_store::{MemoryLockService, MemoryStore, StoreError};

    use crate::context::Settings;

    fn resource() -> (UserResource, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ctx = ReconcileContext::new(
            store.clone(),
            Arc::new(MemoryLockService::new()),
            Settings::default(),
        );
        (UserResource::new(ctx), store)
    }

    #[tokio::test]
    async fn test_given_password_is_used() {
        let (users, store) = resource();
        let state = users
            .create(&UserDesired::new("app").with_password("s3cret"))
            .await
            .unwrap();
        assert_eq!(state.password.as_deref(), Some("s3cret"));
        assert!(store.verify_password("app", "s3cret").await);
    }

    #[tokio::test]
    async fn test_read_never_returns_password() {
        let (users, _) = resource();
        let created = users
            .create(&UserDesired::new("app").with_password("s3cret"))
            .await
            .unwrap();
        assert!(!format!("{created:?}").contains("s3cret"));

        let state = users.read("app").await.unwrap();
        assert!(state.password.is_none());
        assert!(!format!("{state:?}").contains("s3cret"));
    }

    #[tokio::test]
    async fn test_update_changes_password() {
        let (users, store) = resource();
        let state = users
            .create(&UserDesired::new("app").with_password("one"))
            .await
            .unwrap();

        let state = users
            .update(&state, &UserDesired::new("app").with_password("two"))
            .await
            .unwrap();
        assert_eq!(state.password.as_deref(), Some("two"));
        assert!(store.verify_password("app", "two").await);
    }

    #[tokio::test]
    async fn test_rename_is_rejected() {
        let (users, _) = resource();
        let state = users.create(&UserDesired::new("app")).await.unwrap();
        let err = users
            .update(&state, &UserDesired::new("other"))
            .await
            .unwrap_err();
        assert!(matches!(err.error, ReconcileError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_delete_absent_user_keeps_store_error() {
        let (users, _) = resource();
        let state = users.create(&UserDesired::new("app")).await.unwrap();
        users.delete(&state).await.unwrap();

        let err = users.delete(&state).await.unwrap_err();
        assert!(matches!(
            err.error,
            ReconcileError::Store {
                call: StoreCall::UserDelete,
                source: StoreError::UserNotFound(_)
            }
        ));
    }
}
