//! Connection Capability Layer
//!
//! ドライバーが実装する接続能力の抽象化トレイト。
//! コアはこれらを通してのみデータベースに触れる。

use super::types::{ColumnInfo, DbError, ExecuteResult, QueryContext, Row, TxOptions, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// 生の接続能力
///
/// 実行・準備・クエリ・単一行クエリを提供する最小の操作セット
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// INSERT/UPDATE/DELETE等のコマンドを実行
    async fn execute(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> Result<ExecuteResult, DbError>;

    /// プリペアドステートメントを準備
    async fn prepare(
        &self,
        ctx: &QueryContext,
        sql: &str,
    ) -> Result<Box<dyn PreparedStatement>, DbError>;

    /// 複数行を返すクエリを実行
    async fn query(
        &self,
        ctx: &QueryContext,
        sql: &str,
        args: &[Value],
    ) -> Result<Box<dyn Rows>, DbError>;

    /// 単一行を返すクエリを実行（エラーは `Row::scan` で表面化する）
    async fn query_row(&self, ctx: &QueryContext, sql: &str, args: &[Value]) -> Row;
}

/// トランザクションを開始できる接続能力
#[async_trait]
pub trait SqlDatabase: SqlConnection {
    /// トランザクションを開始
    async fn begin(&self) -> Result<Arc<dyn SqlTransaction>, DbError>;

    /// オプション付きでトランザクションを開始
    async fn begin_tx(
        &self,
        ctx: &QueryContext,
        opts: &TxOptions,
    ) -> Result<Arc<dyn SqlTransaction>, DbError>;
}

/// トランザクション能力
#[async_trait]
pub trait SqlTransaction: SqlConnection {
    /// トランザクションをコミット
    async fn commit(&self) -> Result<(), DbError>;

    /// トランザクションをロールバック
    async fn rollback(&self) -> Result<(), DbError>;
}

/// プリペアドステートメント抽象化トレイト
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    /// プリペアドステートメントを実行（INSERT/UPDATE/DELETE）
    async fn execute(&self, ctx: &QueryContext, args: &[Value])
        -> Result<ExecuteResult, DbError>;

    /// プリペアドステートメントを実行（SELECT）
    async fn query(&self, ctx: &QueryContext, args: &[Value]) -> Result<Box<dyn Rows>, DbError>;

    /// ステートメントを破棄
    async fn close(&self) -> Result<(), DbError>;
}

/// 行カーソル
///
/// 呼び出し元が所有し、使い終わったら `close` する。
#[async_trait]
pub trait Rows: Send {
    fn columns(&self) -> &[ColumnInfo];

    /// 次の行。終端では `Ok(None)`
    async fn next_row(&mut self) -> Result<Option<Vec<Value>>, DbError>;

    async fn close(&mut self) -> Result<(), DbError>;
}
