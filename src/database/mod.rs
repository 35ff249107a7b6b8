//! Database Execution Module
//!
//! 接続能力の上に、トレース付きの実行コンテキスト・トランザクション制御・
//! 共有クエリファクトリを提供する

pub mod connection;
pub mod dsl;
pub mod engine;
pub mod exec;
pub mod trace;
pub mod transaction;
pub mod types;

// 公開API
pub use connection::Database;
pub use dsl::{ExecutionContext, QueryRunner};
pub use engine::{PreparedStatement, Rows, SqlConnection, SqlDatabase, SqlTransaction};
pub use exec::{
    default_query_factory_builder, FromRow, FromValue, QueryExecutor, QueryFactory,
    QueryFactoryBuilder, RowQueryFactory, RowTarget, ValueTarget,
};
pub use trace::{format_trace, TraceSink, TracingSink, DEFAULT_NAMESPACE};
pub use transaction::{Transaction, TransactionState};
pub use types::{
    ColumnInfo, DatabaseError, DbError, ExecuteResult, IsolationLevel, QueryContext, Row,
    TxOptions, Value,
};
