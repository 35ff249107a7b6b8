//! Query factory and result scanning
//!
//! A [`QueryFactory`] turns literal SQL plus arguments into a
//! [`QueryExecutor`] that scans results into caller-supplied targets. Each
//! execution context builds its factory once, on first use, through a
//! [`QueryFactoryBuilder`].

use super::dsl::{ExecutionContext, QueryRunner};
use super::engine::Rows;
use super::types::{ColumnInfo, DbError, QueryContext, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds the shared factory for an execution context.
///
/// Runs at most once per context, inside the context's initialization
/// guard; a builder must not call back into the `scan_*` family of the
/// context it is given.
pub type QueryFactoryBuilder =
    Arc<dyn Fn(&ExecutionContext) -> Arc<dyn QueryFactory> + Send + Sync>;

/// Produces executors bound to a raw SQL string.
pub trait QueryFactory: Send + Sync {
    fn from_sql(&self, sql: &str, args: Vec<Value>) -> Box<dyn QueryExecutor>;
}

/// Scans the result of one bound query.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Every row into `target`.
    async fn scan_structs(
        &self,
        ctx: &QueryContext,
        target: &mut dyn RowTarget,
    ) -> Result<(), DbError>;

    /// The first row into `target`; `false` when there was none.
    async fn scan_struct(
        &self,
        ctx: &QueryContext,
        target: &mut dyn RowTarget,
    ) -> Result<bool, DbError>;

    /// The first column of every row into `target`.
    async fn scan_vals(
        &self,
        ctx: &QueryContext,
        target: &mut dyn ValueTarget,
    ) -> Result<(), DbError>;

    /// The first column of the first row into `target`; `false` when there was none.
    async fn scan_val(
        &self,
        ctx: &QueryContext,
        target: &mut dyn ValueTarget,
    ) -> Result<bool, DbError>;
}

/// Conversion from a single column value.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, DbError>;
}

fn mismatch(expected: &str, value: &Value) -> DbError {
    DbError::ConversionError(format!(
        "cannot convert {} value into {}",
        value.type_name(),
        expected
    ))
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, DbError> {
        Ok(value)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, DbError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch("i64", &other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, DbError> {
        match value {
            Value::Int(i) => i32::try_from(i)
                .map_err(|_| DbError::ConversionError(format!("{} overflows i32", i))),
            other => Err(mismatch("i32", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, DbError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, DbError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(i) => Ok(i != 0),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, DbError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch("String", &other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, DbError> {
        match value {
            Value::Binary(b) => Ok(b),
            Value::String(s) => Ok(s.into_bytes()),
            other => Err(mismatch("Vec<u8>", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, DbError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Conversion from a whole row.
pub trait FromRow: Sized {
    fn from_row(columns: &[ColumnInfo], values: Vec<Value>) -> Result<Self, DbError>;
}

impl FromRow for Vec<Value> {
    fn from_row(_columns: &[ColumnInfo], values: Vec<Value>) -> Result<Self, DbError> {
        Ok(values)
    }
}

impl FromRow for HashMap<String, Value> {
    fn from_row(columns: &[ColumnInfo], values: Vec<Value>) -> Result<Self, DbError> {
        if columns.len() != values.len() {
            return Err(DbError::ConversionError(format!(
                "row has {} values for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(columns
            .iter()
            .map(|c| c.name.clone())
            .zip(values)
            .collect())
    }
}

/// Destination for whole rows.
pub trait RowTarget: Send {
    fn push_row(&mut self, columns: &[ColumnInfo], values: Vec<Value>) -> Result<(), DbError>;
}

impl<T: FromRow + Send> RowTarget for Vec<T> {
    fn push_row(&mut self, columns: &[ColumnInfo], values: Vec<Value>) -> Result<(), DbError> {
        self.push(T::from_row(columns, values)?);
        Ok(())
    }
}

impl<T: FromRow + Send> RowTarget for Option<T> {
    fn push_row(&mut self, columns: &[ColumnInfo], values: Vec<Value>) -> Result<(), DbError> {
        *self = Some(T::from_row(columns, values)?);
        Ok(())
    }
}

/// Destination for single column values.
pub trait ValueTarget: Send {
    fn push_value(&mut self, value: Value) -> Result<(), DbError>;
}

impl<T: FromValue + Send> ValueTarget for Vec<T> {
    fn push_value(&mut self, value: Value) -> Result<(), DbError> {
        self.push(T::from_value(value)?);
        Ok(())
    }
}

impl<T: FromValue + Send> ValueTarget for Option<T> {
    fn push_value(&mut self, value: Value) -> Result<(), DbError> {
        *self = Some(T::from_value(value)?);
        Ok(())
    }
}

/// Builder used when none is configured.
pub fn default_query_factory_builder() -> QueryFactoryBuilder {
    Arc::new(|ctx: &ExecutionContext| {
        Arc::new(RowQueryFactory::new(ctx.runner().clone())) as Arc<dyn QueryFactory>
    })
}

/// Factory whose executors run the query through the context's traced
/// `query` path and read the cursor row by row.
#[derive(Clone)]
pub struct RowQueryFactory {
    runner: QueryRunner,
}

impl RowQueryFactory {
    pub fn new(runner: QueryRunner) -> Self {
        Self { runner }
    }
}

impl QueryFactory for RowQueryFactory {
    fn from_sql(&self, sql: &str, args: Vec<Value>) -> Box<dyn QueryExecutor> {
        Box::new(RowQueryExecutor {
            runner: self.runner.clone(),
            sql: sql.to_string(),
            args,
        })
    }
}

struct RowQueryExecutor {
    runner: QueryRunner,
    sql: String,
    args: Vec<Value>,
}

impl RowQueryExecutor {
    async fn open(&self, ctx: &QueryContext) -> Result<Box<dyn Rows>, DbError> {
        self.runner.query_context(ctx, &self.sql, &self.args).await
    }
}

#[async_trait]
impl QueryExecutor for RowQueryExecutor {
    async fn scan_structs(
        &self,
        ctx: &QueryContext,
        target: &mut dyn RowTarget,
    ) -> Result<(), DbError> {
        let mut rows = self.open(ctx).await?;
        let scanned = read_rows(rows.as_mut(), None, |columns, values| {
            target.push_row(columns, values)
        })
        .await;
        close_after(rows.as_mut(), scanned).await.map(|_| ())
    }

    async fn scan_struct(
        &self,
        ctx: &QueryContext,
        target: &mut dyn RowTarget,
    ) -> Result<bool, DbError> {
        let mut rows = self.open(ctx).await?;
        let scanned = read_rows(rows.as_mut(), Some(1), |columns, values| {
            target.push_row(columns, values)
        })
        .await;
        close_after(rows.as_mut(), scanned).await.map(|n| n > 0)
    }

    async fn scan_vals(
        &self,
        ctx: &QueryContext,
        target: &mut dyn ValueTarget,
    ) -> Result<(), DbError> {
        let mut rows = self.open(ctx).await?;
        let scanned = read_rows(rows.as_mut(), None, |_, values| {
            target.push_value(first_column(values)?)
        })
        .await;
        close_after(rows.as_mut(), scanned).await.map(|_| ())
    }

    async fn scan_val(
        &self,
        ctx: &QueryContext,
        target: &mut dyn ValueTarget,
    ) -> Result<bool, DbError> {
        let mut rows = self.open(ctx).await?;
        let scanned = read_rows(rows.as_mut(), Some(1), |_, values| {
            target.push_value(first_column(values)?)
        })
        .await;
        close_after(rows.as_mut(), scanned).await.map(|n| n > 0)
    }
}

fn first_column(values: Vec<Value>) -> Result<Value, DbError> {
    values
        .into_iter()
        .next()
        .ok_or_else(|| DbError::ConversionError("row has no columns".to_string()))
}

/// Feeds up to `limit` rows to `on_row`, returning how many were read.
async fn read_rows<F>(
    rows: &mut dyn Rows,
    limit: Option<usize>,
    mut on_row: F,
) -> Result<usize, DbError>
where
    F: FnMut(&[ColumnInfo], Vec<Value>) -> Result<(), DbError> + Send,
{
    let mut count = 0;
    while limit.is_none_or(|max| count < max) {
        let Some(values) = rows.next_row().await? else {
            break;
        };
        on_row(rows.columns(), values)?;
        count += 1;
    }
    Ok(count)
}

/// Closes the cursor; a close error only surfaces when the scan succeeded.
async fn close_after<T: Send>(
    rows: &mut dyn Rows,
    scanned: Result<T, DbError>,
) -> Result<T, DbError> {
    let closed = rows.close().await;
    let value = scanned?;
    closed?;
    Ok(value)
}
