//! Transaction handle
//!
//! Wraps a transactional connection capability in an execution context and
//! drives the commit-or-rollback completion protocol.

use super::dsl::ExecutionContext;
use super::engine::SqlTransaction;
use super::types::DbError;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

/// Completion state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Open => write!(f, "open"),
            TransactionState::Committed => write!(f, "committed"),
            TransactionState::RolledBack => write!(f, "rolled back"),
        }
    }
}

struct TxShared {
    tx: Arc<dyn SqlTransaction>,
    state: Mutex<TransactionState>,
}

impl TxShared {
    fn state(&self) -> TransactionState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Leaves `Open` at most once; terminal states are never overwritten.
    fn finish(&self, next: TransactionState) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *state == TransactionState::Open {
            *state = next;
        }
    }
}

impl Drop for TxShared {
    fn drop(&mut self) {
        if self.state() == TransactionState::Open {
            tracing::warn!("transaction dropped without commit or rollback");
        }
    }
}

/// A transaction in progress.
///
/// Clones share the underlying transaction and its completion state. One
/// logical owner is expected to drive [`commit`](Self::commit),
/// [`rollback`](Self::rollback) or [`wrap`](Self::wrap).
#[derive(Clone)]
pub struct Transaction {
    ctx: ExecutionContext,
    shared: Arc<TxShared>,
}

impl Transaction {
    /// `ctx` must run its statements on `tx`.
    pub fn new(ctx: ExecutionContext, tx: Arc<dyn SqlTransaction>) -> Self {
        Self {
            ctx,
            shared: Arc::new(TxShared {
                tx,
                state: Mutex::new(TransactionState::Open),
            }),
        }
    }

    /// Wraps `tx` in a fresh context with the given dialect.
    pub fn from_capability(dialect: impl Into<Arc<str>>, tx: Arc<dyn SqlTransaction>) -> Self {
        let ctx = ExecutionContext::new(dialect, tx.clone());
        Self::new(ctx, tx)
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// The transactional capability this handle drives.
    pub fn inner(&self) -> &Arc<dyn SqlTransaction> {
        &self.shared.tx
    }

    pub fn state(&self) -> TransactionState {
        self.shared.state()
    }

    pub fn is_open(&self) -> bool {
        self.state() == TransactionState::Open
    }

    /// COMMIT. Calls after completion are forwarded as-is.
    pub async fn commit(&self) -> Result<(), DbError> {
        self.ctx.trace("COMMIT", "", &[]);
        self.shared.tx.commit().await?;
        tracing::debug!("transaction committed");
        self.shared.finish(TransactionState::Committed);
        Ok(())
    }

    /// ROLLBACK. Calls after completion are forwarded as-is.
    pub async fn rollback(&self) -> Result<(), DbError> {
        self.ctx.trace("ROLLBACK", "", &[]);
        self.shared.tx.rollback().await?;
        tracing::debug!("transaction rolled back");
        self.shared.finish(TransactionState::RolledBack);
        Ok(())
    }

    /// Runs `work`, then commits on success or rolls back otherwise.
    ///
    /// - `Ok`: commit; a commit error replaces the result.
    /// - `Err(e)`: rollback; a rollback error replaces `e`, otherwise `e` is
    ///   returned.
    /// - panic: rollback (its outcome is only logged), then the panic resumes
    ///   with its original payload.
    ///
    /// ```no_run
    /// # use sqlexec_core::database::{DbError, Transaction, Value};
    /// # async fn example(tx: Transaction) -> Result<(), DbError> {
    /// tx.wrap(|| async {
    ///     tx.exec("INSERT INTO items (id) VALUES (?)", &[Value::Int(1)]).await?;
    ///     Ok::<_, DbError>(())
    /// })
    /// .await
    /// # }
    /// ```
    pub async fn wrap<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let outcome = AssertUnwindSafe(async move { work().await })
            .catch_unwind()
            .await;

        match outcome {
            Err(fault) => {
                if let Err(e) = self.rollback().await {
                    tracing::warn!(error = %e, "rollback after panic failed");
                }
                std::panic::resume_unwind(fault)
            }
            Ok(Err(err)) => match self.rollback().await {
                Ok(()) => Err(err),
                Err(rollback_err) => {
                    tracing::debug!(error = %rollback_err, "rollback failed, replacing work error");
                    Err(rollback_err.into())
                }
            },
            Ok(Ok(value)) => match self.commit().await {
                Ok(()) => Ok(value),
                Err(commit_err) => Err(commit_err.into()),
            },
        }
    }
}

impl Deref for Transaction {
    type Target = ExecutionContext;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("context", &self.ctx)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::engine::{PreparedStatement, Rows, SqlConnection};
    use crate::database::types::{ExecuteResult, QueryContext, Row, Value};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTx {
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        fail_commit: bool,
    }

    #[async_trait]
    impl SqlConnection for CountingTx {
        async fn execute(
            &self,
            _ctx: &QueryContext,
            _sql: &str,
            _args: &[Value],
        ) -> Result<ExecuteResult, DbError> {
            Ok(ExecuteResult::default())
        }

        async fn prepare(
            &self,
            _ctx: &QueryContext,
            _sql: &str,
        ) -> Result<Box<dyn PreparedStatement>, DbError> {
            Err(DbError::UnsupportedOperation("prepare".to_string()))
        }

        async fn query(
            &self,
            _ctx: &QueryContext,
            _sql: &str,
            _args: &[Value],
        ) -> Result<Box<dyn Rows>, DbError> {
            Err(DbError::UnsupportedOperation("query".to_string()))
        }

        async fn query_row(&self, _ctx: &QueryContext, _sql: &str, _args: &[Value]) -> Row {
            Row::empty()
        }
    }

    #[async_trait]
    impl SqlTransaction for CountingTx {
        async fn commit(&self) -> Result<(), DbError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            if self.fail_commit {
                return Err(DbError::TransactionFailed("commit".to_string()));
            }
            Ok(())
        }

        async fn rollback(&self) -> Result<(), DbError> {
            self.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_state_transitions_once() {
        let inner = Arc::new(CountingTx::default());
        let tx = Transaction::from_capability("sqlite", inner.clone());
        assert!(tx.is_open());

        tx.commit().await.unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);

        // forwarded, but the recorded state stays terminal
        tx.rollback().await.unwrap();
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(inner.commits.load(Ordering::SeqCst), 1);
        assert_eq!(inner.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_open() {
        let inner = Arc::new(CountingTx {
            fail_commit: true,
            ..Default::default()
        });
        let tx = Transaction::from_capability("sqlite", inner.clone());

        let err = tx.commit().await.unwrap_err();
        assert_eq!(err, DbError::TransactionFailed("commit".to_string()));
        assert_eq!(tx.state(), TransactionState::Open);
    }

    #[tokio::test]
    async fn test_wrap_returns_work_value() {
        let inner = Arc::new(CountingTx::default());
        let tx = Transaction::from_capability("sqlite", inner.clone());

        let value = tx
            .wrap(|| async { Ok::<_, DbError>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(tx.state(), TransactionState::Committed);
        assert_eq!(inner.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TransactionState::RolledBack.to_string(), "rolled back");
    }
}
