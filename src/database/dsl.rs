//! Execution context
//!
//! [`QueryRunner`] carries the dialect tag, the trace sink slot and the raw
//! connection, and issues trace-instrumented statements. [`ExecutionContext`]
//! adds the lazily built, shared [`QueryFactory`] used by the `scan_*`
//! family. Both are cheap to clone; clones share the connection, the sink
//! slot and the factory.

use super::engine::{PreparedStatement, Rows, SqlConnection};
use super::exec::{default_query_factory_builder, QueryFactory, QueryFactoryBuilder};
use super::exec::{RowTarget, ValueTarget};
use super::trace::{format_trace, TraceSink, DEFAULT_NAMESPACE};
use super::types::{DbError, ExecuteResult, QueryContext, Row, Value};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock, RwLock};

type TraceSlot = Arc<RwLock<Option<Arc<dyn TraceSink>>>>;

/// Trace-instrumented access to a raw connection.
#[derive(Clone)]
pub struct QueryRunner {
    dialect: Arc<str>,
    namespace: Arc<str>,
    trace: TraceSlot,
    conn: Arc<dyn SqlConnection>,
}

impl QueryRunner {
    pub fn new(dialect: impl Into<Arc<str>>, conn: Arc<dyn SqlConnection>) -> Self {
        Self {
            dialect: dialect.into(),
            namespace: Arc::from(DEFAULT_NAMESPACE),
            trace: Arc::new(RwLock::new(None)),
            conn,
        }
    }

    /// Dialect tag selecting the SQL generation rules of collaborators.
    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Prefix of every trace entry.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn connection(&self) -> &Arc<dyn SqlConnection> {
        &self.conn
    }

    pub fn trace_sink(&self) -> Option<Arc<dyn TraceSink>> {
        match self.trace.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the trace sink for this runner and every clone of it.
    ///
    /// Meant to be called once, before the handle is shared. Entries emitted
    /// by operations running concurrently with the swap may go to either sink.
    pub fn set_trace_sink(&self, sink: Option<Arc<dyn TraceSink>>) {
        match self.trace.write() {
            Ok(mut slot) => *slot = sink,
            Err(poisoned) => *poisoned.into_inner() = sink,
        }
    }

    /// Logs an operation. Silent when no sink is configured.
    pub fn trace(&self, op: &str, sql: &str, args: &[Value]) {
        if let Some(sink) = self.trace_sink() {
            sink.log(&format_trace(&self.namespace, op, sql, args));
        }
    }

    pub async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecuteResult, DbError> {
        self.exec_context(&QueryContext::background(), sql, args)
            .await
    }

    pub async fn exec_context(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> Result<ExecuteResult, DbError> {
        self.trace("EXEC", sql, args);
        self.conn.execute(ctx, sql, args).await
    }

    pub async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>, DbError> {
        self.prepare_context(&QueryContext::background(), sql).await
    }

    pub async fn prepare_context(
        &self,
        ctx: &QueryContext,
        sql: &str,
    ) -> Result<Box<dyn PreparedStatement>, DbError> {
        self.trace("PREPARE", sql, &[]);
        self.conn.prepare(ctx, sql).await
    }

    /// The returned cursor belongs to the caller, who should close it.
    pub async fn query(&self, sql: &str, args: &[Value]) -> Result<Box<dyn Rows>, DbError> {
        self.query_context(&QueryContext::background(), sql, args)
            .await
    }

    pub async fn query_context(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> Result<Box<dyn Rows>, DbError> {
        self.trace("QUERY", sql, args);
        self.conn.query(ctx, sql, args).await
    }

    pub async fn query_row(&self, sql: &str, args: &[Value]) -> Row {
        self.query_row_context(&QueryContext::background(), sql, args)
            .await
    }

    /// Errors surface when the row is scanned.
    pub async fn query_row_context(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> Row {
        self.trace("QUERY ROW", sql, args);
        self.conn.query_row(ctx, sql, args).await
    }
}

/// A dialect-tagged, traced handle over a raw connection that owns one
/// lazily built query factory.
#[derive(Clone)]
pub struct ExecutionContext {
    runner: QueryRunner,
    query_factory: Arc<OnceLock<Arc<dyn QueryFactory>>>,
    factory_builder: QueryFactoryBuilder,
}

impl ExecutionContext {
    pub fn new(dialect: impl Into<Arc<str>>, conn: Arc<dyn SqlConnection>) -> Self {
        Self {
            runner: QueryRunner::new(dialect, conn),
            query_factory: Arc::new(OnceLock::new()),
            factory_builder: default_query_factory_builder(),
        }
    }

    /// The returned handle builds its own factory, so scans trace under the
    /// new namespace too.
    pub fn with_namespace(mut self, namespace: impl Into<Arc<str>>) -> Self {
        self.runner.namespace = namespace.into();
        self.query_factory = Arc::new(OnceLock::new());
        self
    }

    /// The returned handle builds its factory with `builder` on first use.
    pub fn with_query_factory_builder(mut self, builder: QueryFactoryBuilder) -> Self {
        self.factory_builder = builder;
        self.query_factory = Arc::new(OnceLock::new());
        self
    }

    pub fn runner(&self) -> &QueryRunner {
        &self.runner
    }

    /// A context over another connection carrying this one's dialect,
    /// namespace, current sink and factory builder, with its own factory slot.
    pub(crate) fn derive(&self, conn: Arc<dyn SqlConnection>) -> Self {
        let runner = QueryRunner {
            dialect: self.runner.dialect.clone(),
            namespace: self.runner.namespace.clone(),
            trace: Arc::new(RwLock::new(self.runner.trace_sink())),
            conn,
        };
        Self {
            runner,
            query_factory: Arc::new(OnceLock::new()),
            factory_builder: self.factory_builder.clone(),
        }
    }

    /// The shared factory, built on first use.
    pub(crate) fn query_factory(&self) -> Arc<dyn QueryFactory> {
        self.query_factory
            .get_or_init(|| {
                tracing::debug!(dialect = %self.runner.dialect, "building query factory");
                (self.factory_builder)(self)
            })
            .clone()
    }

    pub async fn scan_structs(
        &self,
        target: &mut dyn RowTarget,
        sql: &str,
        args: &[Value],
    ) -> Result<(), DbError> {
        self.scan_structs_context(&QueryContext::background(), target, sql, args)
            .await
    }

    pub async fn scan_structs_context(
        &self,
        ctx: &QueryContext,
        target: &mut dyn RowTarget,
        sql: &str,
        args: &[Value],
    ) -> Result<(), DbError> {
        let executor = self.query_factory().from_sql(sql, args.to_vec());
        executor.scan_structs(ctx, target).await
    }

    pub async fn scan_struct(
        &self,
        target: &mut dyn RowTarget,
        sql: &str,
        args: &[Value],
    ) -> Result<bool, DbError> {
        self.scan_struct_context(&QueryContext::background(), target, sql, args)
            .await
    }

    pub async fn scan_struct_context(
        &self,
        ctx: &QueryContext,
        target: &mut dyn RowTarget,
        sql: &str,
        args: &[Value],
    ) -> Result<bool, DbError> {
        let executor = self.query_factory().from_sql(sql, args.to_vec());
        executor.scan_struct(ctx, target).await
    }

    pub async fn scan_vals(
        &self,
        target: &mut dyn ValueTarget,
        sql: &str,
        args: &[Value],
    ) -> Result<(), DbError> {
        self.scan_vals_context(&QueryContext::background(), target, sql, args)
            .await
    }

    pub async fn scan_vals_context(
        &self,
        ctx: &QueryContext,
        target: &mut dyn ValueTarget,
        sql: &str,
        args: &[Value],
    ) -> Result<(), DbError> {
        let executor = self.query_factory().from_sql(sql, args.to_vec());
        executor.scan_vals(ctx, target).await
    }

    pub async fn scan_val(
        &self,
        target: &mut dyn ValueTarget,
        sql: &str,
        args: &[Value],
    ) -> Result<bool, DbError> {
        self.scan_val_context(&QueryContext::background(), target, sql, args)
            .await
    }

    pub async fn scan_val_context(
        &self,
        ctx: &QueryContext,
        target: &mut dyn ValueTarget,
        sql: &str,
        args: &[Value],
    ) -> Result<bool, DbError> {
        let executor = self.query_factory().from_sql(sql, args.to_vec());
        executor.scan_val(ctx, target).await
    }
}

impl Deref for ExecutionContext {
    type Target = QueryRunner;

    fn deref(&self) -> &Self::Target {
        &self.runner
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("dialect", &self.runner.dialect)
            .field("namespace", &self.runner.namespace)
            .field("traced", &self.runner.trace_sink().is_some())
            .field("query_factory_built", &self.query_factory.get().is_some())
            .finish()
    }
}
