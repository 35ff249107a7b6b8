//! # sqlexec-core
//!
//! Transactional execution core that sits between a query-building front end
//! and a raw database connection.
//!
//! - [`database::Database`] wraps a transaction-issuing connection and
//!   issues trace-instrumented statements.
//! - [`database::Transaction`] drives the commit-or-rollback protocol
//!   ([`wrap`](database::Transaction::wrap)), rolling back on errors and
//!   panics.
//! - Every context lazily builds one shared [`database::QueryFactory`] used
//!   by the `scan_*` family.
//!
//! Drivers plug in by implementing [`database::SqlDatabase`] and
//! [`database::SqlTransaction`].

pub mod config;
pub mod database;
pub mod error;
pub mod logging;

pub use config::ExecSettings;
pub use database::{Database, DatabaseError, DbError, ExecutionContext, Transaction};
pub use error::{Error, Result};
