//! # etcd-reconcile
//!
//! Reconcile declarative keys, roles, users and permission grants against an
//! etcd store and its RBAC subsystem.
//!
//! ## Overview
//!
//! Each resource kind exposes create, read, update, delete and import through
//! the [`Resource`] trait. An operation maps a desired-state record onto a
//! short sequence of store calls:
//!
//! - **Keys** serialize on a per-key lock named `/resourceKeyRead/<key>`
//! - **Roles** are identified by name; renaming runs a no-rollback saga
//! - **Users** carry a write-only password, generated when not given
//! - **Permissions** encode prefix or explicit ranges onto a role
//!
//! The reconciler keeps no state of its own. The store is the system of
//! record, and every read mints a fresh [`ExternalId`](core::ExternalId), so
//! callers compare observed values rather than identifiers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use etcd_reconcile::{KeyDesired, Provider, Resource, Settings};
//! use etcd_reconcile::store::{MemoryLockService, MemoryStore};
//!
//! async fn example() {
//!     let provider = Provider::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MemoryLockService::new()),
//!         Settings::default(),
//!     );
//!
//!     let keys = provider.keys();
//!     let state = keys.create(&KeyDesired::new("/app/mode", "on")).await.unwrap();
//!     assert_eq!(state.value, "on");
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `etcd_reconcile::core` - Identifiers, prefix ranges, password generation
//! - `etcd_reconcile::store` - Store and lock contracts plus in-memory versions
//! - `etcd_reconcile::perms` - Grant encoding and decoding

pub mod config;
pub mod context;
pub mod data;
pub mod error;
pub mod key;
pub mod lock;
pub mod permission;
pub mod provider;
pub mod resource;
pub mod role;
pub mod user;

pub use etcd_reconcile_core as core;
pub use etcd_reconcile_perms as perms;
pub use etcd_reconcile_store as store;

pub use config::{ConnectionPlan, ProviderConfig, TlsSettings};
pub use context::{ReconcileContext, Settings};
pub use data::{KeyData, KeyEntry, KeyPrefixData, KeyPrefixState};
pub use error::{Operation, OperationError, ReconcileError, ResourceKind, Result, StoreCall};
pub use key::{KeyDesired, KeyResource, KeyState};
pub use lock::{key_lock_name, with_key_lock, KeyLock, KEY_LOCK_PREFIX};
pub use permission::{PermissionDesired, PermissionResource, PermissionState};
pub use provider::{Connection, Connector, Provider};
pub use resource::Resource;
pub use role::{RenameReport, RenameStep, RoleDesired, RoleResource, RoleState};
pub use user::{UserDesired, UserResource, UserState};
