//! Database handle
//!
//! The top-level handle over a transaction-issuing connection. Statements
//! can be issued on it directly (it dereferences to its
//! [`ExecutionContext`]) or inside transactions it begins.

use super::dsl::ExecutionContext;
use super::engine::{SqlDatabase, SqlTransaction};
use super::exec::QueryFactoryBuilder;
use super::trace::{TraceSink, TracingSink};
use super::transaction::Transaction;
use super::types::{DbError, QueryContext, TxOptions};
use crate::config::ExecSettings;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

/// Handle over a database connection capability.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use sqlexec_core::database::{Database, DbError, SqlDatabase, Value};
/// # async fn example(driver: Arc<dyn SqlDatabase>) -> Result<(), DbError> {
/// let db = Database::new("postgres", driver);
/// db.with_tx(|tx| async move {
///     tx.exec("INSERT INTO items (id) VALUES (?)", &[Value::Int(1)]).await?;
///     Ok::<_, DbError>(())
/// })
/// .await
/// # }
/// ```
#[derive(Clone)]
pub struct Database {
    ctx: ExecutionContext,
    db: Arc<dyn SqlDatabase>,
}

impl Database {
    pub fn new(dialect: impl Into<Arc<str>>, db: Arc<dyn SqlDatabase>) -> Self {
        Self {
            ctx: ExecutionContext::new(dialect, db.clone()),
            db,
        }
    }

    /// Dialect, namespace and tracing taken from settings. With tracing
    /// enabled the entries go to the `tracing` subscriber.
    pub fn from_settings(settings: &ExecSettings, db: Arc<dyn SqlDatabase>) -> Self {
        let database = Self::new(settings.dialect.as_str(), db)
            .with_namespace(settings.trace.namespace.as_str());
        if settings.trace.enabled {
            database.with_trace_sink(Arc::new(TracingSink))
        } else {
            database
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<Arc<str>>) -> Self {
        self.ctx = self.ctx.with_namespace(namespace);
        self
    }

    pub fn with_trace_sink(self, sink: Arc<dyn TraceSink>) -> Self {
        self.ctx.set_trace_sink(Some(sink));
        self
    }

    /// Also used by every transaction begun afterwards.
    pub fn with_query_factory_builder(mut self, builder: QueryFactoryBuilder) -> Self {
        self.ctx = self.ctx.with_query_factory_builder(builder);
        self
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// The connection capability this handle wraps.
    pub fn inner(&self) -> &Arc<dyn SqlDatabase> {
        &self.db
    }

    /// Starts a transaction. Driver errors are returned unchanged.
    pub async fn begin(&self) -> Result<Transaction, DbError> {
        let tx = self.db.begin().await?;
        Ok(self.new_transaction(tx))
    }

    /// Starts a transaction with options passed through to the driver.
    pub async fn begin_tx(
        &self,
        ctx: &QueryContext,
        opts: &TxOptions,
    ) -> Result<Transaction, DbError> {
        let tx = self.db.begin_tx(ctx, opts).await?;
        Ok(self.new_transaction(tx))
    }

    fn new_transaction(&self, tx: Arc<dyn SqlTransaction>) -> Transaction {
        tracing::debug!(dialect = %self.ctx.dialect(), "transaction started");
        Transaction::new(self.ctx.derive(tx.clone()), tx)
    }

    /// Begins a transaction and runs `work` on it under [`Transaction::wrap`].
    ///
    /// A failed begin is returned without running `work`.
    pub async fn with_tx<F, Fut, T, E>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        let tx = self.begin().await?;
        let handle = tx.clone();
        tx.wrap(move || work(handle)).await
    }
}

impl Deref for Database {
    type Target = ExecutionContext;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("context", &self.ctx).finish()
    }
}
