//! # etcd-reconcile permissions
//!
//! Translation between a grant intent ("role R may read everything under
//! `/app/`") and the store's native range permission (`READ` on
//! `["/app/", "/app0")`), and back.
//!
//! ## Key Concepts
//!
//! - **Kind**: the two capabilities a grant can carry, [`PermissionKind::Read`]
//!   and [`PermissionKind::ReadWrite`]
//! - **Prefix mode**: the range end is computed from the key
//! - **Explicit mode**: the caller supplies the range end; it is mandatory
//!
//! ## Usage
//!
//! ```rust
//! use etcd_reconcile_perms::{decode, GrantRequest, PermissionKind};
//!
//! let request = GrantRequest::prefix("readers", "/app/", PermissionKind::Read);
//! let permission = request.encode().unwrap();
//! assert_eq!(permission.range_end.as_ref(), b"/app0");
//!
//! let observed = decode(&[permission], "/app/").unwrap();
//! assert!(observed.with_prefix);
//! ```
//!
//! ## Lenient kinds
//!
//! [`PermissionKind::from_grant_input`] maps any unrecognized string to
//! `Read` without complaint. Schema-level validation uses
//! [`PermissionKind::parse_strict`] instead, which rejects them.

pub mod error;
pub mod grant;
pub mod kind;

pub use error::{PermsError, Result};
pub use grant::{decode, decode_all, matching, reissue, GrantRequest, ObservedPermission};
pub use kind::PermissionKind;
