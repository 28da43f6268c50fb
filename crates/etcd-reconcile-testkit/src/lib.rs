//! # etcd-reconcile testkit
//!
//! Testing utilities for etcd-reconcile.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fault injection**: [`FaultyStore`] fails or delays chosen store calls
//!   and journals every call so tests can check ordering and overlap;
//!   [`FaultyLocks`] does the same for lock sessions
//! - **Fixtures**: a memory store plus lock service, ready to hand to a
//!   reconciler
//! - **Generators**: Proptest strategies for key paths, names and grants
//!
//! ## Test Fixtures
//!
//! ```rust
//! use etcd_reconcile_testkit::{Op, TestFixture};
//!
//! let fixture = TestFixture::new();
//! assert_eq!(fixture.faulty.count(Op::Put), 0);
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;

pub use faults::{Event, FaultyLocks, FaultyStore, Op};
pub use fixtures::{init_tracing, TestFixture};
