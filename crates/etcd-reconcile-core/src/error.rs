//! Error types for the core primitives.

use thiserror::Error;

/// Errors raised while validating inputs or building primitives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("key must not be empty")]
    EmptyKey,

    #[error("{kind} name must not be empty")]
    EmptyName { kind: &'static str },

    #[error("{kind} name {name:?} contains a control character")]
    InvalidName { kind: &'static str, name: String },

    #[error("password policy requires {required} fixed characters but length is {length}")]
    PasswordPolicy { required: usize, length: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
