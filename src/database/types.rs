//! Database Types and Common Structures
//!
//! 実行コアとドライバーの間で受け渡される共通の型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// データベース値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Json(serde_json::Value),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// 値の型名（変換エラーのメッセージ用）
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Json(_) => "json",
            Value::DateTime(_) => "datetime",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "<nil>"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Binary(bytes) => {
                write!(f, "[")?;
                for (idx, byte) in bytes.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", byte)?;
                }
                write!(f, "]")
            }
            Value::Json(j) => write!(f, "{}", j),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// カラム情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
        }
    }
}

/// コマンド実行結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    /// 影響を受けた行数
    pub rows_affected: u64,
    /// 最後に挿入されたID（AUTO_INCREMENTなど）
    pub last_insert_id: Option<Value>,
    /// 実行時間（ミリ秒）
    pub execution_time_ms: u64,
}

/// 単一行の結果ハンドル
///
/// `query_row` はエラーを直接返さない。エラーや「行なし」は `scan` 時に表面化する。
#[derive(Debug, Clone)]
pub struct Row {
    outcome: Result<Option<(Vec<ColumnInfo>, Vec<Value>)>, DbError>,
}

impl Row {
    pub fn new(columns: Vec<ColumnInfo>, values: Vec<Value>) -> Self {
        Self {
            outcome: Ok(Some((columns, values))),
        }
    }

    /// 該当行なし
    pub fn empty() -> Self {
        Self { outcome: Ok(None) }
    }

    /// 遅延エラーを保持する行
    pub fn from_error(err: DbError) -> Self {
        Self { outcome: Err(err) }
    }

    /// 保持しているエラー（あれば）
    pub fn err(&self) -> Option<&DbError> {
        self.outcome.as_ref().err()
    }

    pub fn columns(&self) -> Result<&[ColumnInfo], DbError> {
        match &self.outcome {
            Ok(Some((columns, _))) => Ok(columns),
            Ok(None) => Err(DbError::NoRows),
            Err(e) => Err(e.clone()),
        }
    }

    /// 行の値を取り出す
    pub fn scan(self) -> Result<Vec<Value>, DbError> {
        match self.outcome {
            Ok(Some((_, values))) => Ok(values),
            Ok(None) => Err(DbError::NoRows),
            Err(e) => Err(e),
        }
    }
}

/// 分離レベル
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationLevel::ReadUncommitted => write!(f, "READ UNCOMMITTED"),
            IsolationLevel::ReadCommitted => write!(f, "READ COMMITTED"),
            IsolationLevel::RepeatableRead => write!(f, "REPEATABLE READ"),
            IsolationLevel::Serializable => write!(f, "SERIALIZABLE"),
        }
    }
}

/// トランザクション開始オプション
///
/// コアは解釈せず、そのままドライバーに渡す。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    /// None の場合はドライバーの既定値
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// クエリコンテキスト
///
/// キャンセルとデッドラインを運ぶ。コア自身はこれを参照せず、ドライバーへ素通しする。
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub context_id: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// キャンセルもデッドラインも持たない空のコンテキスト
    pub fn background() -> Self {
        Self {
            context_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..Self::background()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::background()
    }
}

/// データベースエラー
///
/// ドライバーが生成し、コアはラップせずにそのまま呼び出し元へ返す。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("no rows in result set")]
    NoRows,

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Deadlock detected: {0}")]
    DeadlockDetected(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Data conversion error: {0}")]
    ConversionError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// 短縮名
pub type DbError = DatabaseError;
