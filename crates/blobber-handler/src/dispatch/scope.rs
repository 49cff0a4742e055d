//! Transaction scopes: one datastore transaction per request, terminated
//! exactly once.
//!
//! `TransactionScope` is a guard. `commit` and `rollback` consume it, so a
//! terminated scope cannot be touched again. If the guard is dropped while
//! still open (the handler panicked, or the request future was cancelled)
//! `Drop` rolls the transaction back.

use crate::domain::context::TransactionHandle;
use crate::domain::error::{HandlerError, OperationResult, StoreError};
use crate::domain::operations::ScopePolicy;
use crate::middleware::metrics::HandlerStats;
use crate::ports::outbound::{MetaStore, Transaction};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Lifecycle of a scope: `Open -> {Committed | RolledBack}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Open,
    Committed,
    RolledBack,
}

/// One open transaction bound to one request
pub struct TransactionScope {
    tx: Arc<dyn Transaction>,
    state: ScopeState,
    stats: Arc<HandlerStats>,
}

impl TransactionScope {
    /// Open a new transaction on `store`
    pub fn open(store: &dyn MetaStore, stats: Arc<HandlerStats>) -> Result<Self, StoreError> {
        let tx = store.create_transaction()?;
        stats.record_scope_opened();
        Ok(Self {
            tx,
            state: ScopeState::Open,
            stats,
        })
    }

    /// Data-only handle for business code
    pub fn handle(&self) -> TransactionHandle {
        TransactionHandle::new(Arc::clone(&self.tx))
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Commit the transaction.
    ///
    /// On failure the transaction is rolled back before returning, so the
    /// scope still ends terminated and nothing staged becomes visible.
    pub fn commit(mut self) -> Result<(), StoreError> {
        match self.tx.commit() {
            Ok(()) => {
                self.state = ScopeState::Committed;
                self.stats.record_commit();
                Ok(())
            }
            Err(e) => {
                self.stats.record_commit_failure();
                self.finish_rollback();
                Err(e)
            }
        }
    }

    /// Roll the transaction back. Failures are logged and counted, not returned.
    pub fn rollback(mut self) {
        self.finish_rollback();
    }

    fn finish_rollback(&mut self) {
        match self.tx.rollback() {
            Ok(()) => {}
            // Some engines discard the transaction themselves on a failed commit
            Err(StoreError::TransactionFinished) => {
                debug!("Transaction already finished by the engine");
            }
            Err(e) => {
                warn!(error = %e, "Rollback failed");
                self.stats.record_rollback_failure();
            }
        }
        self.state = ScopeState::RolledBack;
        self.stats.record_rollback();
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.state == ScopeState::Open {
            warn!("Transaction scope dropped while open, rolling back");
            self.stats.record_abandoned_scope();
            self.finish_rollback();
        }
    }
}

/// Run `call` inside `scope` and terminate the scope according to `policy`.
///
/// - `ReadOnly`: always roll back and return the handler's result unchanged.
/// - `ReadWrite`: roll back and return the handler's error unchanged, or
///   commit and return the payload. A failed commit discards the payload and
///   returns `commit_error`.
pub async fn run_scoped<F, Fut>(scope: TransactionScope, policy: ScopePolicy, call: F) -> OperationResult
where
    F: FnOnce(TransactionHandle) -> Fut,
    Fut: Future<Output = OperationResult>,
{
    let result = call(scope.handle()).await;

    match policy {
        ScopePolicy::ReadOnly => {
            scope.rollback();
            result
        }
        ScopePolicy::ReadWrite => match result {
            Err(e) => {
                scope.rollback();
                Err(e)
            }
            Ok(payload) => match scope.commit() {
                Ok(()) => Ok(payload),
                Err(e) => {
                    error!(error = %e, "Error committing to meta store");
                    Err(HandlerError::commit_error())
                }
            },
        },
    }
}
