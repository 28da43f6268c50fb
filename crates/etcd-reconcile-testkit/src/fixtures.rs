//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::{Arc, Once};

use etcd_reconcile_store::{
    LockService, MemoryLockService, MemoryStore, RangePermission, Result, Store,
};

use crate::faults::{FaultyLocks, FaultyStore};

/// A memory store and lock service, fronted by [`FaultyStore`] and
/// [`FaultyLocks`].
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
    pub locks: MemoryLockService,
    pub faulty: Arc<FaultyStore>,
    pub faulty_locks: Arc<FaultyLocks>,
}

impl TestFixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let faulty = Arc::new(FaultyStore::new(store.clone()));
        let locks = MemoryLockService::new();
        let faulty_locks = Arc::new(FaultyLocks::new(Arc::new(locks.clone())));
        Self {
            store,
            locks,
            faulty,
            faulty_locks,
        }
    }

    /// The store handle reconcilers should use. Calls go through the fault
    /// injector, which passes them straight on until told otherwise.
    pub fn store_handle(&self) -> Arc<dyn Store> {
        self.faulty.clone()
    }

    /// The lock service reconcilers should use, fronted by [`FaultyLocks`].
    pub fn lock_handle(&self) -> Arc<dyn LockService> {
        self.faulty_locks.clone()
    }

    /// Write a key directly, bypassing any reconciler.
    pub async fn seed_key(&self, key: &str, value: &str) -> Result<()> {
        self.store.put(key.as_bytes(), value.as_bytes()).await
    }

    /// Create a role holding `permissions`.
    pub async fn seed_role(&self, name: &str, permissions: &[RangePermission]) -> Result<()> {
        self.store.role_add(name).await?;
        for permission in permissions {
            self.store
                .role_grant_permission(name, permission.clone())
                .await?;
        }
        Ok(())
    }

    /// Value currently stored under `key`.
    pub async fn value_of(&self, key: &str) -> Option<String> {
        self.store
            .get(key.as_bytes())
            .await
            .ok()
            .and_then(|resp| resp.first().map(|kv| kv.value_str()))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use etcd_reconcile_store::PermType;

    #[tokio::test]
    async fn test_seeded_role_has_grants() {
        let fixture = TestFixture::new();
        fixture
            .seed_role("r", &[RangePermission::new(PermType::Read, "/a", "/b")])
            .await
            .unwrap();

        let role = fixture.store_handle().role_get("r").await.unwrap();
        assert_eq!(role.permissions.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_key() {
        let fixture = TestFixture::new();
        fixture.seed_key("/a", "1").await.unwrap();
        assert_eq!(fixture.value_of("/a").await.as_deref(), Some("1"));
        assert_eq!(fixture.value_of("/b").await, None);
    }
}
