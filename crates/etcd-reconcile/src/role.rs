//! Role resource and the rename saga.
//!
//! A role is identified by its name. Renaming is not a store primitive, so
//! an update that changes the name runs five steps in order:
//!
//! 1. fetch the source role
//! 2. check the target name is free
//! 3. create the target role
//! 4. copy every grant of the source onto the target
//! 5. delete the source role
//!
//! Nothing is rolled back. Once step 3 has run, a failure is reported as
//! [`ReconcileError::RenameIncomplete`] listing the completed steps, and the
//! store is left as it stands for the operator to inspect. A failed copy
//! never reaches the delete, so the source keeps all of its grants.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use etcd_reconcile_core::{validate_role_name, ExternalId};
use etcd_reconcile_perms::{decode_all, reissue, ObservedPermission};
use etcd_reconcile_store::RoleInfo;

use crate::context::ReconcileContext;
use crate::error::{
    DuringExt, Operation, OperationError, ReconcileError, ResourceKind, Result, StoreCall,
};
use crate::resource::Resource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDesired {
    pub name: String,
}

impl RoleDesired {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleState {
    /// Always the role name.
    pub id: ExternalId,
    pub name: String,
    pub permissions: Vec<ObservedPermission>,
}

impl RoleState {
    fn observed(info: &RoleInfo) -> Self {
        Self {
            id: ExternalId::from_natural(info.name.clone()),
            name: info.name.clone(),
            permissions: decode_all(&info.permissions),
        }
    }
}

/// A step of the rename saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenameStep {
    FetchSource,
    CheckTarget,
    CreateTarget,
    CopyGrants,
    DeleteSource,
}

/// Outcome of a completed rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameReport {
    pub from: String,
    pub to: String,
    pub grants_copied: usize,
}

/// Tracks completed steps so a failure can report how far the rename got.
struct Saga<'a> {
    from: &'a str,
    to: &'a str,
    completed: Vec<RenameStep>,
}

impl<'a> Saga<'a> {
    fn new(from: &'a str, to: &'a str) -> Self {
        Self {
            from,
            to,
            completed: Vec::new(),
        }
    }

    fn done(&mut self, step: RenameStep) {
        tracing::debug!(from = self.from, to = self.to, ?step, "rename step done");
        self.completed.push(step);
    }

    /// Failure of a step that left the store changed.
    fn stopped(&self, failed: RenameStep, source: ReconcileError) -> ReconcileError {
        tracing::warn!(
            from = self.from,
            to = self.to,
            ?failed,
            completed = ?self.completed,
            error = %source,
            "role rename stopped partway, nothing rolled back"
        );
        ReconcileError::RenameIncomplete {
            from: self.from.to_string(),
            to: self.to.to_string(),
            completed: self.completed.clone(),
            failed,
            source: Box::new(source),
        }
    }
}

pub struct RoleResource {
    ctx: ReconcileContext,
}

impl RoleResource {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    /// `None` when the store reports the role absent.
    async fn lookup(&self, name: &str) -> Result<Option<RoleInfo>> {
        match self
            .ctx
            .call(StoreCall::RoleGet, self.ctx.store.role_get(name))
            .await
        {
            Ok(info) => Ok(Some(info)),
            Err(e) if e.is_store_absence() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_role(&self, desired: &RoleDesired) -> Result<RoleState> {
        validate_role_name(&desired.name)?;

        if self.lookup(&desired.name).await?.is_some() {
            return Err(ReconcileError::AlreadyManaged {
                kind: ResourceKind::Role,
                name: desired.name.clone(),
            });
        }
        self.ctx
            .call(StoreCall::RoleAdd, self.ctx.store.role_add(&desired.name))
            .await?;

        tracing::info!(role = %desired.name, "role created");
        self.read_role(&desired.name).await
    }

    async fn read_role(&self, name: &str) -> Result<RoleState> {
        self.lookup(name)
            .await?
            .as_ref()
            .map(RoleState::observed)
            .ok_or_else(|| ReconcileError::not_found(ResourceKind::Role, name))
    }

    /// Move a role and its grants to a new name.
    pub async fn rename(&self, from: &str, to: &str) -> Result<RenameReport> {
        validate_role_name(to)?;
        let mut saga = Saga::new(from, to);

        let source = self
            .lookup(from)
            .await?
            .ok_or_else(|| ReconcileError::not_found(ResourceKind::Role, from))?;
        saga.done(RenameStep::FetchSource);

        if self.lookup(to).await?.is_some() {
            return Err(ReconcileError::AlreadyExists {
                kind: ResourceKind::Role,
                name: to.to_string(),
            });
        }
        saga.done(RenameStep::CheckTarget);

        self.ctx
            .call(StoreCall::RoleAdd, self.ctx.store.role_add(to))
            .await
            .map_err(|e| saga.stopped(RenameStep::CreateTarget, e))?;
        saga.done(RenameStep::CreateTarget);

        for permission in &source.permissions {
            self.ctx
                .call(
                    StoreCall::RoleGrantPermission,
                    self.ctx.store.role_grant_permission(to, reissue(permission)),
                )
                .await
                .map_err(|e| saga.stopped(RenameStep::CopyGrants, e))?;
        }
        saga.done(RenameStep::CopyGrants);

        self.ctx
            .call(StoreCall::RoleDelete, self.ctx.store.role_delete(from))
            .await
            .map_err(|e| saga.stopped(RenameStep::DeleteSource, e))?;
        saga.done(RenameStep::DeleteSource);

        tracing::info!(from, to, grants = source.permissions.len(), "role renamed");
        Ok(RenameReport {
            from: from.to_string(),
            to: to.to_string(),
            grants_copied: source.permissions.len(),
        })
    }

    async fn update_role(&self, prior: &RoleState, desired: &RoleDesired) -> Result<RoleState> {
        if desired.name != prior.name {
            self.rename(&prior.name, &desired.name).await?;
        }
        self.read_role(&desired.name).await
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        if self.lookup(name).await?.is_none() {
            return Err(ReconcileError::not_found(ResourceKind::Role, name));
        }
        self.ctx
            .call(StoreCall::RoleDelete, self.ctx.store.role_delete(name))
            .await?;
        tracing::info!(role = name, "role deleted");
        Ok(())
    }
}

#[async_trait]
impl Resource for RoleResource {
    const KIND: ResourceKind = ResourceKind::Role;
    type Desired = RoleDesired;
    type State = RoleState;

    async fn create(&self, desired: &RoleDesired) -> Result<RoleState, OperationError> {
        self.create_role(desired)
            .await
            .during(Operation::Create(Self::KIND))
    }

    async fn read(&self, name: &str) -> Result<RoleState, OperationError> {
        self.read_role(name).await.during(Operation::Read(Self::KIND))
    }

    async fn update(
        &self,
        prior: &RoleState,
        desired: &RoleDesired,
    ) -> Result<RoleState, OperationError> {
        self.update_role(prior, desired)
            .await
            .during(Operation::Update(Self::KIND))
    }

    async fn delete(&self, state: &RoleState) -> Result<(), OperationError> {
        self.delete_role(&state.name)
            .await
            .during(Operation::Delete(Self::KIND))
    }

    async fn import(&self, name: &str) -> Result<RoleState, OperationError> {
        self.read_role(name).await.during(Operation::Import(Self::KIND))
    }
}
