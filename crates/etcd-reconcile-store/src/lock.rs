//! Lease-backed named locks.
//!
//! A [`LockSession`] stands for a lease: every lock taken through it is owned
//! by that lease, and closing (or dropping) the session releases whatever it
//! still holds. Locks are keyed by an arbitrary path string, so callers decide
//! what they serialize on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Result, StoreError};

/// Proof of a held lock, returned by [`LockSession::lock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    /// The lock name that was acquired.
    pub name: String,
    /// Lease of the owning session.
    pub lease: i64,
}

impl LockHandle {
    /// Ownership key as etcd writes it: `<name>/<lease in hex>`.
    pub fn key(&self) -> String {
        format!("{}/{:x}", self.name, self.lease)
    }
}

/// Factory for lock sessions.
#[async_trait]
pub trait LockService: Send + Sync {
    /// Open a session backed by a fresh lease.
    async fn open_session(&self) -> Result<Box<dyn LockSession>>;
}

/// A lease-scoped session through which named locks are taken.
#[async_trait]
pub trait LockSession: Send + Sync {
    /// Lease id backing this session.
    fn lease(&self) -> i64;

    /// Block until `name` is acquired.
    ///
    /// Dropping the returned future before it resolves leaves nothing held.
    async fn lock(&self, name: &str) -> Result<LockHandle>;

    /// Release a lock held by this session.
    async fn unlock(&self, handle: &LockHandle) -> Result<()>;

    /// Revoke the lease, releasing every lock still held.
    async fn close(&self) -> Result<()>;
}

/// In-process lock service.
///
/// Sessions from the same service contend on the same lock table, so two
/// reconcilers sharing a `MemoryLockService` serialize exactly like two
/// processes sharing an etcd cluster.
#[derive(Clone, Default)]
pub struct MemoryLockService {
    table: Arc<LockTable>,
}

#[derive(Default)]
struct LockTable {
    mutexes: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    next_lease: AtomicI64,
    acquisitions: AtomicU64,
}

impl LockTable {
    async fn mutex_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut mutexes = self.mutexes.lock().await;
        Arc::clone(mutexes.entry(name.to_string()).or_default())
    }

    /// Forget names nobody holds or waits on. The table keeps the only
    /// reference to such a mutex.
    fn prune<'a>(
        mutexes: &mut HashMap<String, Arc<Mutex<()>>>,
        names: impl Iterator<Item = &'a str>,
    ) {
        for name in names {
            if mutexes.get(name).is_some_and(|m| Arc::strong_count(m) == 1) {
                mutexes.remove(name);
            }
        }
    }

    async fn release(&self, names: &[String]) {
        let mut mutexes = self.mutexes.lock().await;
        Self::prune(&mut mutexes, names.iter().map(String::as_str));
    }
}

impl MemoryLockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of successful acquisitions across all sessions.
    pub fn acquisitions(&self) -> u64 {
        self.table.acquisitions.load(Ordering::SeqCst)
    }

    /// Whether some session currently holds `name`.
    pub async fn is_locked(&self, name: &str) -> bool {
        let mutexes = self.table.mutexes.lock().await;
        mutexes.get(name).is_some_and(|m| m.try_lock().is_err())
    }

    /// Number of lock names currently held or waited on.
    pub async fn tracked(&self) -> usize {
        self.table.mutexes.lock().await.len()
    }
}

#[async_trait]
impl LockService for MemoryLockService {
    async fn open_session(&self) -> Result<Box<dyn LockSession>> {
        let lease = self.table.next_lease.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(lease, "lock session opened");
        Ok(Box::new(MemoryLockSession {
            table: Arc::clone(&self.table),
            lease,
            held: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Session handed out by [`MemoryLockService`].
pub struct MemoryLockSession {
    table: Arc<LockTable>,
    lease: i64,
    /// Guards for locks this session holds; dropping one releases the lock.
    held: Mutex<HashMap<String, OwnedMutexGuard<()>>>,
    closed: AtomicBool,
}

#[async_trait]
impl LockSession for MemoryLockSession {
    fn lease(&self) -> i64 {
        self.lease
    }

    async fn lock(&self, name: &str) -> Result<LockHandle> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::SessionClosed);
        }

        let mutex = self.table.mutex_for(name).await;
        let guard = mutex.lock_owned().await;

        // The lease may have been revoked while we waited.
        if self.closed.load(Ordering::SeqCst) {
            drop(guard);
            self.table.release(&[name.to_string()]).await;
            return Err(StoreError::SessionClosed);
        }

        self.held.lock().await.insert(name.to_string(), guard);
        self.table.acquisitions.fetch_add(1, Ordering::SeqCst);

        Ok(LockHandle {
            name: name.to_string(),
            lease: self.lease,
        })
    }

    async fn unlock(&self, handle: &LockHandle) -> Result<()> {
        if handle.lease != self.lease {
            return Err(StoreError::LockNotHeld(handle.key()));
        }
        let guard = self
            .held
            .lock()
            .await
            .remove(&handle.name)
            .ok_or_else(|| StoreError::LockNotHeld(handle.key()))?;
        drop(guard);
        self.table.release(&[handle.name.clone()]).await;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        let released: Vec<String> = {
            let mut held = self.held.lock().await;
            held.drain().map(|(name, _guard)| name).collect()
        };
        if !released.is_empty() {
            tracing::warn!(
                lease = self.lease,
                released = released.len(),
                "lease revoked with locks held"
            );
            self.table.release(&released).await;
        }
        Ok(())
    }
}

impl Drop for MemoryLockSession {
    fn drop(&mut self) {
        let released: Vec<String> = self
            .held
            .get_mut()
            .drain()
            .map(|(name, _guard)| name)
            .collect();
        if released.is_empty() {
            return;
        }
        // Best effort; a contended table is pruned by the next release.
        if let Ok(mut mutexes) = self.table.mutexes.try_lock() {
            LockTable::prune(&mut mutexes, released.iter().map(String::as_str));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_unlock() {
        let service = MemoryLockService::new();
        let session = service.open_session().await.unwrap();

        let handle = session.lock("/resourceKeyRead/a").await.unwrap();
        assert!(service.is_locked("/resourceKeyRead/a").await);
        assert_eq!(handle.key(), format!("/resourceKeyRead/a/{:x}", session.lease()));

        session.unlock(&handle).await.unwrap();
        assert!(!service.is_locked("/resourceKeyRead/a").await);
        assert_eq!(service.acquisitions(), 1);
    }

    #[tokio::test]
    async fn test_unlock_twice_fails() {
        let service = MemoryLockService::new();
        let session = service.open_session().await.unwrap();
        let handle = session.lock("x").await.unwrap();
        session.unlock(&handle).await.unwrap();
        assert!(matches!(
            session.unlock(&handle).await,
            Err(StoreError::LockNotHeld(_))
        ));
    }

    #[tokio::test]
    async fn test_second_session_waits_for_release() {
        let service = MemoryLockService::new();
        let first = service.open_session().await.unwrap();
        let second = service.open_session().await.unwrap();

        let handle = first.lock("k").await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), second.lock("k")).await;
        assert!(blocked.is_err(), "second session must wait");

        first.unlock(&handle).await.unwrap();
        let handle = second.lock("k").await.unwrap();
        assert_eq!(handle.lease, second.lease());
    }

    #[tokio::test]
    async fn test_close_releases_held_locks() {
        let service = MemoryLockService::new();
        let session = service.open_session().await.unwrap();
        session.lock("a").await.unwrap();
        session.lock("b").await.unwrap();

        session.close().await.unwrap();
        assert!(!service.is_locked("a").await);
        assert!(!service.is_locked("b").await);
        assert!(matches!(
            session.lock("a").await,
            Err(StoreError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_released_names_are_forgotten() {
        let service = MemoryLockService::new();
        let session = service.open_session().await.unwrap();
        for i in 0..5 {
            let handle = session.lock(&format!("/k{i}")).await.unwrap();
            session.unlock(&handle).await.unwrap();
        }
        assert_eq!(service.tracked().await, 0);

        session.lock("/a").await.unwrap();
        session.lock("/b").await.unwrap();
        assert_eq!(service.tracked().await, 2);
        session.close().await.unwrap();
        assert_eq!(service.tracked().await, 0);

        {
            let dropped = service.open_session().await.unwrap();
            dropped.lock("/c").await.unwrap();
        }
        assert_eq!(service.tracked().await, 0);
    }

    #[tokio::test]
    async fn test_waiter_keeps_name_tracked() {
        let service = MemoryLockService::new();
        let first = service.open_session().await.unwrap();
        let second = service.open_session().await.unwrap();

        let handle = first.lock("k").await.unwrap();
        let waiter = tokio::spawn(async move {
            let acquired = second.lock("k").await;
            (second, acquired)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        first.unlock(&handle).await.unwrap();
        let (second, acquired) = waiter.await.unwrap();
        acquired.unwrap();
        assert!(service.is_locked("k").await);
        second.close().await.unwrap();
        assert_eq!(service.tracked().await, 0);
    }

    #[tokio::test]
    async fn test_dropped_session_releases_locks() {
        let service = MemoryLockService::new();
        {
            let session = service.open_session().await.unwrap();
            session.lock("a").await.unwrap();
        }
        assert!(!service.is_locked("a").await);
    }
}
