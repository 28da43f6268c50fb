//! Store and lock-service wrappers that inject failures and delays and
//! record every call.
//!
//! ```rust,ignore
//! let faulty = FaultyStore::new(store);
//! faulty.fail_on(Op::RoleGrantPermission, 2, StoreError::Unavailable("reset".into()));
//! faulty.delay(Op::Put, Duration::from_millis(20));
//!
//! let locks = FaultyLocks::new(lock_service);
//! locks.fail_always(Op::Unlock, StoreError::Unavailable("lease lost".into()));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use etcd_reconcile_store::{
    DeleteResponse, GetResponse, LockHandle, LockService, LockSession, RangePermission, Result,
    RoleInfo, Store, StoreError, UserInfo,
};

/// Call kinds, one per [`Store`], [`LockService`] and [`LockSession`] method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    GetWithPrefix,
    Put,
    Delete,
    RoleAdd,
    RoleGet,
    RoleDelete,
    RoleGrantPermission,
    RoleRevokePermission,
    UserAdd,
    UserGet,
    UserDelete,
    UserChangePassword,
    OpenSession,
    Lock,
    Unlock,
    CloseSession,
}

/// Journal entry. `End` is missing for calls that were cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Begin(Op),
    End(Op),
}

struct Fault {
    op: Op,
    /// 1-based call number to fail; `None` fails every call.
    nth: Option<usize>,
    error: StoreError,
}

#[derive(Default)]
struct FaultState {
    calls: HashMap<Op, usize>,
    faults: Vec<Fault>,
    delays: HashMap<Op, Duration>,
    journal: Vec<Event>,
}

/// Fault schedule and call journal shared by the wrappers.
#[derive(Default)]
struct Faults {
    state: Mutex<FaultState>,
}

impl Faults {
    fn state(&self) -> MutexGuard<'_, FaultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fail_on(&self, op: Op, nth: usize, error: StoreError) {
        self.state().faults.push(Fault {
            op,
            nth: Some(nth),
            error,
        });
    }

    fn fail_always(&self, op: Op, error: StoreError) {
        self.state().faults.push(Fault {
            op,
            nth: None,
            error,
        });
    }

    fn delay(&self, op: Op, delay: Duration) {
        self.state().delays.insert(op, delay);
    }

    fn heal(&self) {
        let mut state = self.state();
        state.faults.clear();
        state.delays.clear();
    }

    fn count(&self, op: Op) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    fn journal(&self) -> Vec<Event> {
        self.state().journal.clone()
    }

    fn max_in_flight(&self, op: Op) -> usize {
        let mut current = 0usize;
        let mut max = 0usize;
        for event in self.state().journal.iter() {
            match event {
                Event::Begin(o) if *o == op => {
                    current += 1;
                    max = max.max(current);
                }
                Event::End(o) if *o == op => current = current.saturating_sub(1),
                _ => {}
            }
        }
        max
    }

    async fn invoke<T, F>(&self, op: Op, call: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>> + Send,
    {
        let (delay, fault) = {
            let mut state = self.state();
            let n = {
                let count = state.calls.entry(op).or_insert(0);
                *count += 1;
                *count
            };
            state.journal.push(Event::Begin(op));
            let fault = state
                .faults
                .iter()
                .find(|f| f.op == op && f.nth.map_or(true, |nth| nth == n))
                .map(|f| f.error.clone());
            (state.delays.get(&op).copied(), fault)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = match fault {
            Some(error) => {
                tracing::debug!(?op, %error, "injecting fault");
                Err(error)
            }
            None => call.await,
        };
        self.state().journal.push(Event::End(op));
        result
    }
}

pub struct FaultyStore {
    inner: Arc<dyn Store>,
    faults: Faults,
}

impl FaultyStore {
    pub fn new(inner: Arc<dyn Store>) -> Self {
        Self {
            inner,
            faults: Faults::default(),
        }
    }

    /// Fail the `nth` call (1-based) of `op` with `error`.
    pub fn fail_on(&self, op: Op, nth: usize, error: StoreError) {
        self.faults.fail_on(op, nth, error);
    }

    /// Fail every call of `op` with `error`.
    pub fn fail_always(&self, op: Op, error: StoreError) {
        self.faults.fail_always(op, error);
    }

    /// Hold every call of `op` for `delay` before it reaches the store.
    pub fn delay(&self, op: Op, delay: Duration) {
        self.faults.delay(op, delay);
    }

    /// Drop all faults and delays. Counters and journal are kept.
    pub fn heal(&self) {
        self.faults.heal();
    }

    /// Number of calls of `op` made so far, including failed ones.
    pub fn count(&self, op: Op) -> usize {
        self.faults.count(op)
    }

    pub fn journal(&self) -> Vec<Event> {
        self.faults.journal()
    }

    /// Largest number of `op` calls that were in flight at the same time.
    pub fn max_in_flight(&self, op: Op) -> usize {
        self.faults.max_in_flight(op)
    }

    async fn invoke<T, F>(&self, op: Op, call: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>> + Send,
    {
        self.faults.invoke(op, call).await
    }
}

/// Lock service whose sessions fail or stall on demand.
///
/// Every session opened through it shares one fault schedule and journal.
pub struct FaultyLocks {
    inner: Arc<dyn LockService>,
    faults: Arc<Faults>,
}

impl FaultyLocks {
    pub fn new(inner: Arc<dyn LockService>) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Fail the `nth` lock-service call (1-based) of `op` with `error`.
    pub fn fail_on(&self, op: Op, nth: usize, error: StoreError) {
        self.faults.fail_on(op, nth, error);
    }

    pub fn fail_always(&self, op: Op, error: StoreError) {
        self.faults.fail_always(op, error);
    }

    pub fn count(&self, op: Op) -> usize {
        self.faults.count(op)
    }

    pub fn journal(&self) -> Vec<Event> {
        self.faults.journal()
    }
}

#[async_trait]
impl LockService for FaultyLocks {
    async fn open_session(&self) -> Result<Box<dyn LockSession>> {
        let inner = self
            .faults
            .invoke(Op::OpenSession, self.inner.open_session())
            .await?;
        Ok(Box::new(FaultySession {
            inner,
            faults: Arc::clone(&self.faults),
        }))
    }
}

struct FaultySession {
    inner: Box<dyn LockSession>,
    faults: Arc<Faults>,
}

#[async_trait]
impl LockSession for FaultySession {
    fn lease(&self) -> i64 {
        self.inner.lease()
    }

    async fn lock(&self, name: &str) -> Result<LockHandle> {
        self.faults.invoke(Op::Lock, self.inner.lock(name)).await
    }

    async fn unlock(&self, handle: &LockHandle) -> Result<()> {
        self.faults.invoke(Op::Unlock, self.inner.unlock(handle)).await
    }

    async fn close(&self) -> Result<()> {
        self.faults
            .invoke(Op::CloseSession, self.inner.close())
            .await
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn get(&self, key: &[u8]) -> Result<GetResponse> {
        self.invoke(Op::Get, self.inner.get(key)).await
    }

    async fn get_with_prefix(&self, prefix: &[u8]) -> Result<GetResponse> {
        self.invoke(Op::GetWithPrefix, self.inner.get_with_prefix(prefix))
            .await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.invoke(Op::Put, self.inner.put(key, value)).await
    }

    async fn delete(&self, key: &[u8]) -> Result<DeleteResponse> {
        self.invoke(Op::Delete, self.inner.delete(key)).await
    }

    async fn role_add(&self, name: &str) -> Result<()> {
        self.invoke(Op::RoleAdd, self.inner.role_add(name)).await
    }

    async fn role_get(&self, name: &str) -> Result<RoleInfo> {
        self.invoke(Op::RoleGet, self.inner.role_get(name)).await
    }

    async fn role_delete(&self, name: &str) -> Result<()> {
        self.invoke(Op::RoleDelete, self.inner.role_delete(name))
            .await
    }

    async fn role_grant_permission(&self, name: &str, permission: RangePermission) -> Result<()> {
        self.invoke(
            Op::RoleGrantPermission,
            self.inner.role_grant_permission(name, permission),
        )
        .await
    }

    async fn role_revoke_permission(
        &self,
        name: &str,
        key: &[u8],
        range_end: &[u8],
    ) -> Result<()> {
        self.invoke(
            Op::RoleRevokePermission,
            self.inner.role_revoke_permission(name, key, range_end),
        )
        .await
    }

    async fn user_add(&self, name: &str, password: &str) -> Result<()> {
        self.invoke(Op::UserAdd, self.inner.user_add(name, password))
            .await
    }

    async fn user_get(&self, name: &str) -> Result<UserInfo> {
        self.invoke(Op::UserGet, self.inner.user_get(name)).await
    }

    async fn user_delete(&self, name: &str) -> Result<()> {
        self.invoke(Op::UserDelete, self.inner.user_delete(name))
            .await
    }

    async fn user_change_password(&self, name: &str, password: &str) -> Result<()> {
        self.invoke(
            Op::UserChangePassword,
            self.inner.user_change_password(name, password),
        )
        .await
    }
}
