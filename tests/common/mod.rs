//! Scripted in-memory driver shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlexec_core::database::{
    ColumnInfo, DbError, ExecuteResult, PreparedStatement, QueryContext, Row, Rows,
    SqlConnection, SqlDatabase, SqlTransaction, TraceSink, TxOptions, Value,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Ordered record of every driver call.
#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

/// Outcomes the fake driver answers with.
#[derive(Clone, Default)]
pub struct Script {
    pub begin_error: Option<DbError>,
    pub commit_error: Option<DbError>,
    pub rollback_error: Option<DbError>,
    pub execute_error: Option<DbError>,
    pub close_error: Option<DbError>,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
}

impl Script {
    pub fn with_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.iter().map(|c| ColumnInfo::new(*c, "TEXT")).collect(),
            rows,
            ..Self::default()
        }
    }
}

#[derive(Clone)]
struct FakeCore {
    journal: Arc<Journal>,
    script: Script,
    contexts: Arc<Mutex<Vec<String>>>,
}

impl FakeCore {
    fn see(&self, ctx: &QueryContext) {
        self.contexts.lock().unwrap().push(ctx.context_id.clone());
    }

    fn execute(&self, ctx: &QueryContext, sql: &str) -> Result<ExecuteResult, DbError> {
        self.see(ctx);
        self.journal.push(format!("execute {}", sql));
        match &self.script.execute_error {
            Some(err) => Err(err.clone()),
            None => Ok(ExecuteResult {
                rows_affected: 1,
                ..ExecuteResult::default()
            }),
        }
    }

    fn prepare(&self, ctx: &QueryContext, sql: &str) -> Result<Box<dyn PreparedStatement>, DbError> {
        self.see(ctx);
        self.journal.push(format!("prepare {}", sql));
        Ok(Box::new(FakeStatement { core: self.clone() }))
    }

    fn query(&self, ctx: &QueryContext, sql: &str) -> Result<Box<dyn Rows>, DbError> {
        self.see(ctx);
        self.journal.push(format!("query {}", sql));
        Ok(Box::new(FakeRows {
            columns: self.script.columns.clone(),
            rows: self.script.rows.clone().into(),
            close_error: self.script.close_error.clone(),
            journal: self.journal.clone(),
        }))
    }

    fn query_row(&self, ctx: &QueryContext, sql: &str) -> Row {
        self.see(ctx);
        self.journal.push(format!("query_row {}", sql));
        match self.script.rows.first() {
            Some(values) => Row::new(self.script.columns.clone(), values.clone()),
            None => Row::empty(),
        }
    }
}

macro_rules! fake_connection {
    ($ty:ty) => {
        #[async_trait]
        impl SqlConnection for $ty {
            async fn execute(
                &self,
                ctx: &QueryContext,
                sql: &str,
                _args: &[Value],
            ) -> Result<ExecuteResult, DbError> {
                self.core.execute(ctx, sql)
            }

            async fn prepare(
                &self,
                ctx: &QueryContext,
                sql: &str,
            ) -> Result<Box<dyn PreparedStatement>, DbError> {
                self.core.prepare(ctx, sql)
            }

            async fn query(
                &self,
                ctx: &QueryContext,
                sql: &str,
                _args: &[Value],
            ) -> Result<Box<dyn Rows>, DbError> {
                self.core.query(ctx, sql)
            }

            async fn query_row(&self, ctx: &QueryContext, sql: &str, _args: &[Value]) -> Row {
                self.core.query_row(ctx, sql)
            }
        }
    };
}

pub struct FakeDatabase {
    core: FakeCore,
    pub options: Mutex<Vec<TxOptions>>,
}

impl FakeDatabase {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            core: FakeCore {
                journal: Arc::new(Journal::default()),
                script,
                contexts: Arc::new(Mutex::new(Vec::new())),
            },
            options: Mutex::new(Vec::new()),
        })
    }

    pub fn journal(&self) -> &Journal {
        &self.core.journal
    }

    /// `context_id`s of every `QueryContext` the driver received.
    pub fn contexts(&self) -> Vec<String> {
        self.core.contexts.lock().unwrap().clone()
    }

    fn transaction(&self) -> Result<Arc<dyn SqlTransaction>, DbError> {
        match &self.core.script.begin_error {
            Some(err) => Err(err.clone()),
            None => Ok(Arc::new(FakeTransaction {
                core: self.core.clone(),
            })),
        }
    }
}

fake_connection!(FakeDatabase);

#[async_trait]
impl SqlDatabase for FakeDatabase {
    async fn begin(&self) -> Result<Arc<dyn SqlTransaction>, DbError> {
        self.core.journal.push("begin");
        self.transaction()
    }

    async fn begin_tx(
        &self,
        ctx: &QueryContext,
        opts: &TxOptions,
    ) -> Result<Arc<dyn SqlTransaction>, DbError> {
        self.core.see(ctx);
        self.core.journal.push("begin_tx");
        self.options.lock().unwrap().push(opts.clone());
        self.transaction()
    }
}

pub struct FakeTransaction {
    core: FakeCore,
}

fake_connection!(FakeTransaction);

#[async_trait]
impl SqlTransaction for FakeTransaction {
    async fn commit(&self) -> Result<(), DbError> {
        self.core.journal.push("commit");
        match &self.core.script.commit_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn rollback(&self) -> Result<(), DbError> {
        self.core.journal.push("rollback");
        match &self.core.script.rollback_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

struct FakeStatement {
    core: FakeCore,
}

#[async_trait]
impl PreparedStatement for FakeStatement {
    async fn execute(&self, ctx: &QueryContext, _args: &[Value]) -> Result<ExecuteResult, DbError> {
        self.core.execute(ctx, "<prepared>")
    }

    async fn query(&self, ctx: &QueryContext, _args: &[Value]) -> Result<Box<dyn Rows>, DbError> {
        self.core.query(ctx, "<prepared>")
    }

    async fn close(&self) -> Result<(), DbError> {
        self.core.journal.push("close statement");
        Ok(())
    }
}

struct FakeRows {
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<Value>>,
    close_error: Option<DbError>,
    journal: Arc<Journal>,
}

#[async_trait]
impl Rows for FakeRows {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, DbError> {
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> Result<(), DbError> {
        self.journal.push("close rows");
        match &self.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Trace sink that keeps every entry.
#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<String>>);

impl RecordingSink {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl TraceSink for RecordingSink {
    fn log(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}
