//! Error types for store and lock calls.

use thiserror::Error;

/// Errors surfaced by a [`Store`](crate::Store) or lock service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transport failure: endpoint unreachable, connection reset.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the client credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("role already exists: {0}")]
    RoleAlreadyExists(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    UserAlreadyExists(String),

    /// Revoke of a range the role does not hold.
    #[error("permission on {key} not granted to role {role}")]
    PermissionNotGranted { role: String, key: String },

    /// The lock session was closed or its lease expired.
    #[error("lock session closed")]
    SessionClosed,

    #[error("lock {0} is not held by this session")]
    LockNotHeld(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
