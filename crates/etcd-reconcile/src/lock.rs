//! Per-key mutual exclusion.
//!
//! Every key operation serializes on a lock named after the key path. The
//! lock lives in a session opened for that one operation, so a crashed or
//! cancelled operation loses its lock when the session's lease goes away.

use std::future::Future;

use etcd_reconcile_store::{LockHandle, LockSession};

use crate::context::ReconcileContext;
use crate::error::{ReconcileError, Result, StoreCall};

/// Namespace of the per-key locks.
pub const KEY_LOCK_PREFIX: &str = "/resourceKeyRead/";

/// Lock name guarding `key`.
pub fn key_lock_name(key: &str) -> String {
    format!("{KEY_LOCK_PREFIX}{key}")
}

/// A held key lock and the session that owns it.
///
/// Call [`KeyLock::release`] on every path. Dropping an unreleased lock tears
/// the session down, which frees the lock once its lease is revoked.
pub struct KeyLock {
    ctx: ReconcileContext,
    session: Box<dyn LockSession>,
    handle: LockHandle,
    released: bool,
}

impl KeyLock {
    /// Open a session and block until the lock for `key` is held.
    ///
    /// Waiting for a contended lock is not bounded by the request deadline;
    /// opening the session is.
    pub async fn acquire(ctx: &ReconcileContext, key: &str) -> Result<Self> {
        let name = key_lock_name(key);
        let session = ctx
            .call(StoreCall::OpenSession, ctx.locks.open_session())
            .await
            .map_err(|e| as_lock_failure(&name, e))?;

        let handle = match session.lock(&name).await {
            Ok(handle) => handle,
            Err(source) => {
                if let Err(e) = session.close().await {
                    tracing::warn!(lock = %name, error = %e, "closing session after failed lock");
                }
                return Err(ReconcileError::LockFailure {
                    call: StoreCall::Lock,
                    name,
                    source,
                });
            }
        };

        tracing::debug!(lock = %handle.key(), "key lock acquired");
        Ok(Self {
            ctx: ctx.clone(),
            session,
            handle,
            released: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    /// Unlock and close the session. The session is closed even when the
    /// unlock fails.
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        let name = self.handle.name.clone();

        let unlocked = self
            .ctx
            .call(StoreCall::Unlock, self.session.unlock(&self.handle))
            .await;
        let closed = self
            .ctx
            .call(StoreCall::CloseSession, self.session.close())
            .await;

        tracing::debug!(lock = %name, "key lock released");
        unlocked
            .and(closed)
            .map_err(|e| as_lock_failure(&name, e))
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                lock = %self.handle.key(),
                "key lock dropped without release, leaving it to the lease"
            );
        }
    }
}

/// Run `op` while holding the lock for `key`, releasing it on every exit.
pub async fn with_key_lock<T, F, Fut>(ctx: &ReconcileContext, key: &str, op: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let lock = KeyLock::acquire(ctx, key).await?;
    let outcome = op().await;
    let released = lock.release().await;

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release)) => Err(release),
        (Err(operation), Ok(())) => Err(operation),
        (Err(operation), Err(release)) => Err(ReconcileError::ReleaseAfterFailure {
            operation: Box::new(operation),
            release: Box::new(release),
        }),
    }
}

fn as_lock_failure(name: &str, err: ReconcileError) -> ReconcileError {
    match err {
        ReconcileError::Store { call, source }
        | ReconcileError::StoreUnavailable { call, source } => ReconcileError::LockFailure {
            call,
            name: name.to_string(),
            source,
        },
        other => other,
    }
}
