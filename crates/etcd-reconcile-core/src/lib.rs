//! # etcd-reconcile core
//!
//! Pure primitives shared by every etcd-reconcile crate.
//!
//! This crate contains no I/O, no storage, no networking. It is plain
//! computation over key paths, identifiers and secrets.
//!
//! ## Key Types
//!
//! - [`ExternalId`] - The opaque identifier handed to the orchestrator
//! - [`prefix_range_end`] - Canonical upper bound of a prefix range
//! - [`PasswordPolicy`] - Rules for generated user passwords
//!
//! ## Key Ranges
//!
//! etcd addresses ranges as `[key, range_end)`. A prefix range ends at the
//! lexicographic successor of the prefix, see [`range`].

pub mod error;
pub mod identity;
pub mod password;
pub mod range;
pub mod validation;

pub use error::{CoreError, Result};
pub use identity::ExternalId;
pub use password::{generate_password, PasswordPolicy};
pub use range::{prefix_range_end, KeyRange, NO_PREFIX_END};
pub use validation::{validate_key, validate_role_name, validate_user_name};
