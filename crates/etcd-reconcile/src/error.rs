//! Error types for reconciliation.
//!
//! [`ReconcileError`] is the taxonomy every step returns. The resource surface
//! wraps it in an [`OperationError`], which adds a stable summary naming the
//! resource operation that failed.

use std::fmt;
use std::time::Duration;

use etcd_reconcile_core::CoreError;
use etcd_reconcile_perms::PermsError;
use etcd_reconcile_store::StoreError;
use thiserror::Error;

use crate::role::RenameStep;

/// Kind of managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Key,
    Role,
    User,
    Permission,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Key => "key",
            ResourceKind::Role => "role",
            ResourceKind::User => "user",
            ResourceKind::Permission => "permission",
        })
    }
}

/// The remote call a step was making when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    Get,
    GetWithPrefix,
    Put,
    Delete,
    RoleAdd,
    RoleGet,
    RoleDelete,
    RoleGrantPermission,
    RoleRevokePermission,
    UserAdd,
    UserGet,
    UserDelete,
    UserChangePassword,
    OpenSession,
    Lock,
    Unlock,
    CloseSession,
}

impl fmt::Display for StoreCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors that can occur while reconciling a resource.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The store reports no such object.
    #[error("{kind} {name:?} is missing from the store")]
    NotFound { kind: ResourceKind, name: String },

    /// Create found an object already in place.
    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    /// Create found an object this reconciler does not own.
    #[error("{kind} {name:?} already exists and is not managed here")]
    AlreadyManaged { kind: ResourceKind, name: String },

    /// Desired state is incomplete or contradictory; no store call was made.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A store call exceeded the per-call deadline.
    #[error("{call} timed out after {after:?}")]
    Timeout { call: StoreCall, after: Duration },

    /// Transport failure. The raw cause is kept as the source only.
    #[error("{call} failed: store unavailable")]
    StoreUnavailable {
        call: StoreCall,
        #[source]
        source: StoreError,
    },

    /// The store rejected a call.
    #[error("{call} failed: {source}")]
    Store {
        call: StoreCall,
        #[source]
        source: StoreError,
    },

    /// Acquiring or releasing the named lock failed.
    #[error("lock {name:?}: {call} failed: {source}")]
    LockFailure {
        call: StoreCall,
        name: String,
        #[source]
        source: StoreError,
    },

    /// The guarded operation failed and releasing its lock failed too.
    #[error("{operation}; releasing the lock also failed: {release}")]
    ReleaseAfterFailure {
        operation: Box<ReconcileError>,
        release: Box<ReconcileError>,
    },

    /// A role rename stopped partway; completed steps were not undone.
    #[error("rename of role {from:?} to {to:?} stopped at {failed:?} after {completed:?}: {source}")]
    RenameIncomplete {
        from: String,
        to: String,
        completed: Vec<RenameStep>,
        failed: RenameStep,
        #[source]
        source: Box<ReconcileError>,
    },
}

impl ReconcileError {
    /// Classify a store error raised by `call`.
    pub fn from_store(call: StoreCall, source: StoreError) -> Self {
        match source {
            StoreError::Unavailable(_) => ReconcileError::StoreUnavailable { call, source },
            source => ReconcileError::Store { call, source },
        }
    }

    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        ReconcileError::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Whether the store reported a missing role or user.
    pub fn is_store_absence(&self) -> bool {
        matches!(
            self,
            ReconcileError::Store {
                source: StoreError::RoleNotFound(_) | StoreError::UserNotFound(_),
                ..
            }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::NotFound { .. })
    }

    /// The store call that failed, if the failure came from one.
    pub fn call(&self) -> Option<StoreCall> {
        match self {
            ReconcileError::Timeout { call, .. }
            | ReconcileError::StoreUnavailable { call, .. }
            | ReconcileError::Store { call, .. }
            | ReconcileError::LockFailure { call, .. } => Some(*call),
            ReconcileError::ReleaseAfterFailure { operation, .. } => operation.call(),
            ReconcileError::RenameIncomplete { source, .. } => source.call(),
            _ => None,
        }
    }
}

impl From<CoreError> for ReconcileError {
    fn from(e: CoreError) -> Self {
        ReconcileError::Configuration(e.to_string())
    }
}

impl From<PermsError> for ReconcileError {
    fn from(e: PermsError) -> Self {
        ReconcileError::Configuration(e.to_string())
    }
}

/// Result type for reconciliation steps.
pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

/// A resource operation exposed to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create(ResourceKind),
    Read(ResourceKind),
    Update(ResourceKind),
    Delete(ResourceKind),
    Import(ResourceKind),
    ReadData(&'static str),
}

impl Operation {
    /// Stable one-line summary for this operation's failures.
    pub fn summary(&self) -> String {
        match self {
            Operation::Create(kind) => format!("Failed creating resource {kind}"),
            Operation::Read(kind) => format!("Failed reading resource {kind}"),
            Operation::Update(kind) => format!("Failed updating resource {kind}"),
            Operation::Delete(kind) => format!("Failed deleting resource {kind}"),
            Operation::Import(kind) => format!("Failed importing resource {kind}"),
            Operation::ReadData(source) => format!("Failed reading data source {source}"),
        }
    }
}

/// Failure of a resource operation: a stable summary plus the cause.
#[derive(Debug, Error)]
#[error("{}: {error}", .operation.summary())]
pub struct OperationError {
    pub operation: Operation,
    #[source]
    pub error: ReconcileError,
}

impl OperationError {
    pub fn summary(&self) -> String {
        self.operation.summary()
    }

    /// Which step failed and why.
    pub fn detail(&self) -> String {
        self.error.to_string()
    }

    pub fn is_not_found(&self) -> bool {
        self.error.is_not_found()
    }
}

/// Attach the operation to a step error.
pub(crate) trait DuringExt<T> {
    fn during(self, operation: Operation) -> Result<T, OperationError>;
}

impl<T> DuringExt<T> for Result<T> {
    fn during(self, operation: Operation) -> Result<T, OperationError> {
        self.map_err(|error| {
            tracing::debug!(summary = %operation.summary(), %error, "operation failed");
            OperationError { operation, error }
        })
    }
}
