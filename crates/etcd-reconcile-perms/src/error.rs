//! Error types for permission translation.

use thiserror::Error;

/// Errors raised while translating a grant request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermsError {
    /// Explicit mode without a range end.
    #[error("range end is mandatory for key {key:?} when prefix mode is off")]
    MissingRangeEnd { key: String },

    /// Prefix mode with an explicit range end that disagrees with the prefix.
    #[error("range end {range_end:?} conflicts with prefix mode for key {key:?}")]
    ConflictingRangeEnd { key: String, range_end: String },

    /// Strict parsing of a permission kind failed.
    #[error("permission must be READ or READ_WRITE, got {0:?}")]
    UnknownKind(String),

    #[error("grant key must not be empty")]
    EmptyKey,

    #[error("grant role must not be empty")]
    EmptyRole,
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
