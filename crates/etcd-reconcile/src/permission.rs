//! Permission resource: one range grant on one role.
//!
//! The desired kind is parsed leniently, so an unrecognized string is granted
//! as `READ`. Range checks happen before any store call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use etcd_reconcile_core::ExternalId;
use etcd_reconcile_perms::{decode, matching, GrantRequest, ObservedPermission, PermissionKind};
use etcd_reconcile_store::{RoleInfo, StoreError};

use crate::context::ReconcileContext;
use crate::error::{
    DuringExt, Operation, OperationError, ReconcileError, ResourceKind, Result, StoreCall,
};
use crate::resource::Resource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDesired {
    pub role: String,
    pub key: String,
    pub with_prefix: bool,
    /// Required when `with_prefix` is false.
    #[serde(default)]
    pub range_end: Option<String>,
    /// `READ` or `READ_WRITE`; anything else grants `READ`.
    pub permission: String,
}

impl PermissionDesired {
    pub fn to_request(&self) -> GrantRequest {
        GrantRequest {
            role: self.role.clone(),
            key: self.key.clone(),
            with_prefix: self.with_prefix,
            range_end: self.range_end.clone(),
            kind: PermissionKind::from_grant_input(&self.permission),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionState {
    pub id: ExternalId,
    pub role: String,
    pub key: String,
    pub with_prefix: bool,
    pub range_end: String,
    pub kind: PermissionKind,
}

impl PermissionState {
    /// `role:key`, as accepted by read and import.
    pub fn natural_key(&self) -> String {
        natural_key(&self.role, &self.key)
    }
}

pub fn natural_key(role: &str, key: &str) -> String {
    format!("{role}:{key}")
}

fn split_natural_key(natural_key: &str) -> Result<(&str, &str)> {
    natural_key
        .split_once(':')
        .filter(|(role, key)| !role.is_empty() && !key.is_empty())
        .ok_or_else(|| {
            ReconcileError::Configuration(format!(
                "permission id {natural_key:?} is not of the form role:key"
            ))
        })
}

pub struct PermissionResource {
    ctx: ReconcileContext,
}

impl PermissionResource {
    pub fn new(ctx: ReconcileContext) -> Self {
        Self { ctx }
    }

    async fn role(&self, name: &str) -> Result<Option<RoleInfo>> {
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

    async fn grant(&self, request: &GrantRequest) -> Result<()> {
        let permission = request.encode()?;
        tracing::debug!(
            role = %request.role,
            key = %request.key,
            kind = %request.kind,
            "granting permission"
        );
        self.ctx
            .call(
                StoreCall::RoleGrantPermission,
                self.ctx
                    .store
                    .role_grant_permission(&request.role, permission),
            )
            .await
    }

    async fn revoke(&self, role: &str, key: &[u8], range_end: &[u8]) -> Result<()> {
        self.ctx
            .call(
                StoreCall::RoleRevokePermission,
                self.ctx.store.role_revoke_permission(role, key, range_end),
            )
            .await
    }

    async fn create_permission(&self, desired: &PermissionDesired) -> Result<PermissionState> {
        let request = desired.to_request();
        request.validate()?;

        let range_end = request.effective_range_end()?;

        self.grant(&request).await?;
        tracing::info!(role = %request.role, key = %request.key, "permission granted");
        self.read_granted(&request.role, &request.key, &range_end).await
    }

    /// First grant on `key`, whatever its range. Used by read and import.
    async fn read_permission(&self, role: &str, key: &str) -> Result<PermissionState> {
        let missing =
            || ReconcileError::not_found(ResourceKind::Permission, natural_key(role, key));

        let info = self.role(role).await?.ok_or_else(missing)?;
        let observed = decode(&info.permissions, key).ok_or_else(missing)?;
        Ok(observed_state(role, observed))
    }

    /// The grant over exactly `[key, range_end)`. Other grants on the same
    /// key belong to someone else and are never adopted.
    async fn read_granted(
        &self,
        role: &str,
        key: &str,
        range_end: &[u8],
    ) -> Result<PermissionState> {
        let missing =
            || ReconcileError::not_found(ResourceKind::Permission, natural_key(role, key));

        let info = self.role(role).await?.ok_or_else(missing)?;
        let observed = matching(&info.permissions, key.as_bytes(), range_end)
            .next()
            .map(ObservedPermission::from_range)
            .ok_or_else(missing)?;
        Ok(observed_state(role, observed))
    }

    async fn update_permission(
        &self,
        prior: &PermissionState,
        desired: &PermissionDesired,
    ) -> Result<PermissionState> {
        if desired.role != prior.role {
            return Err(ReconcileError::Configuration(format!(
                "permission role cannot change from {:?} to {:?}; replace the resource instead",
                prior.role, desired.role
            )));
        }

        let request = desired.to_request();
        request.validate()?;
        let range_end = request.effective_range_end()?;

        self.grant(&request).await?;

        let moved = prior.key != request.key || prior.range_end.as_bytes() != range_end.as_slice();
        if moved {
            match self
                .revoke(&prior.role, prior.key.as_bytes(), prior.range_end.as_bytes())
                .await
            {
                Ok(()) => {}
                Err(ReconcileError::Store {
                    source: StoreError::PermissionNotGranted { .. },
                    ..
                }) => {
                    tracing::debug!(
                        role = %prior.role,
                        key = %prior.key,
                        "previous range already revoked"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(role = %request.role, key = %request.key, moved, "permission updated");
        self.read_granted(&request.role, &request.key, &range_end).await
    }

    /// Revoke the role's grant over the state's range. The store keeps at
    /// most one grant per exact range, so one revoke clears them all.
    async fn delete_permission(&self, state: &PermissionState) -> Result<()> {
        let Some(info) = self.role(&state.role).await? else {
            tracing::debug!(role = %state.role, "role gone, nothing to revoke");
            return Ok(());
        };

        let key = state.key.as_bytes();
        let range_end = state.range_end.as_bytes();
        let count = matching(&info.permissions, key, range_end).count();
        if count > 0 {
            self.revoke(&state.role, key, range_end).await?;
        }

        tracing::info!(
            role = %state.role,
            key = %state.key,
            revoked = count,
            "permission deleted"
        );
        Ok(())
    }
}

fn observed_state(role: &str, observed: ObservedPermission) -> PermissionState {
    PermissionState {
        id: ExternalId::mint(),
        role: role.to_string(),
        key: observed.key,
        with_prefix: observed.with_prefix,
        range_end: observed.range_end,
        kind: observed.kind,
    }
}

#[async_trait]
impl Resource for PermissionResource {
    const KIND: ResourceKind = ResourceKind::Permission;
    type Desired = PermissionDesired;
    type State = PermissionState;

    async fn create(
        &self,
        desired: &PermissionDesired,
    ) -> Result<PermissionState, OperationError> {
        self.create_permission(desired)
            .await
            .during(Operation::Create(Self::KIND))
    }

    async fn read(&self, natural_key: &str) -> Result<PermissionState, OperationError> {
        let op = Operation::Read(Self::KIND);
        let (role, key) = split_natural_key(natural_key).during(op)?;
        self.read_permission(role, key).await.during(op)
    }

    async fn update(
        &self,
        prior: &PermissionState,
        desired: &PermissionDesired,
    ) -> Result<PermissionState, OperationError> {
        self.update_permission(prior, desired)
            .await
            .during(Operation::Update(Self::KIND))
    }

    async fn delete(&self, state: &PermissionState) -> Result<(), OperationError> {
        self.delete_permission(state)
            .await
            .during(Operation::Delete(Self::KIND))
    }

    async fn import(&self, natural_key: &str) -> Result<PermissionState, OperationError> {
        let op = Operation::Import(Self::KIND);
        let (role, key) = split_natural_key(natural_key).during(op)?;
        self.read_permission(role, key).await.during(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_split() {
        assert_eq!(split_natural_key("app:/a:b").unwrap(), ("app", "/a:b"));
        assert!(split_natural_key("no-separator").is_err());
        assert!(split_natural_key(":/a").is_err());
    }

    #[test]
    fn test_lenient_kind() {
        let desired = PermissionDesired {
            role: "r".into(),
            key: "/a".into(),
            with_prefix: true,
            range_end: None,
            permission: "WRITE".into(),
        };
        assert_eq!(desired.to_request().kind, PermissionKind::Read);
    }
}
