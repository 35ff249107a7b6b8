//! Operation tracing
//!
//! Every statement issued through an execution context is reported to an
//! optional [`TraceSink`]. The message shape is stable:
//!
//! ```text
//! [sqlexec] EXEC [query:=`INSERT INTO t VALUES (?)` args:=[7]]
//! [sqlexec] QUERY [query:=`SELECT 1`]
//! [sqlexec] COMMIT
//! ```

use super::types::Value;
use std::fmt::Write as _;

/// Namespace prefixed to every trace entry unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "[sqlexec]";

/// Receives formatted operation records.
///
/// Implementations must not panic; tracing is best-effort and never fails an
/// operation.
pub trait TraceSink: Send + Sync {
    fn log(&self, message: &str);
}

/// Forwards trace entries to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn log(&self, message: &str) {
        tracing::info!(target: "sqlexec::trace", "{}", message);
    }
}

impl<F> TraceSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Builds a trace entry.
pub fn format_trace(namespace: &str, op: &str, sql: &str, args: &[Value]) -> String {
    let mut message = format!("{} {}", namespace, op);
    if sql.is_empty() {
        return message;
    }

    let _ = write!(message, " [query:=`{}`", sql);
    if !args.is_empty() {
        let _ = write!(message, " args:={}", format_args_list(args));
    }
    message.push(']');
    message
}

fn format_args_list(args: &[Value]) -> String {
    let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    format!("[{}]", rendered.join(" "))
}
