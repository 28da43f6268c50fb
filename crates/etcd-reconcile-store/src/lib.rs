//! # etcd-reconcile store
//!
//! The contracts etcd-reconcile consumes from the outside world: a key-value
//! store with an RBAC admin API, and a lease-backed named lock service.
//!
//! ## Overview
//!
//! Both collaborators are traits so the reconciler never holds a global
//! client. The production implementations live behind the wire transport;
//! this crate ships in-memory implementations with etcd semantics for tests
//! and local runs.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for KV and RBAC calls
//! - [`LockService`] / [`LockSession`] - Named mutual-exclusion locks
//! - [`MemoryStore`] - In-memory store with revisions and RBAC tables
//! - [`MemoryLockService`] - In-process locks with session teardown
//!
//! ## Usage
//!
//! ```rust,no_run
//! use etcd_reconcile_store::{MemoryStore, Store};
//!
//! async fn example() {
//!     let store = MemoryStore::new();
//!     store.put(b"/app/config", b"on").await.unwrap();
//!
//!     let resp = store.get(b"/app/config").await.unwrap();
//!     assert_eq!(resp.count, 1);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Role grants are upserts**: granting the same `[key, range_end)` twice
//!   replaces the permission type.
//! - **Sessions own their locks**: closing or dropping a session releases
//!   every lock it still holds, like an expired lease.

pub mod error;
pub mod lock;
pub mod memory;
pub mod traits;

pub use error::{Result, StoreError};
pub use lock::{LockHandle, LockService, LockSession, MemoryLockService};
pub use memory::MemoryStore;
pub use traits::{
    DeleteResponse, GetResponse, KeyValue, PermType, RangePermission, RoleInfo, Store, UserInfo,
};
