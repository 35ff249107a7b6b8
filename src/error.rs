//! Error types for setting up the execution core.
//!
//! Statement-level failures use [`DatabaseError`](crate::database::DatabaseError)
//! and are never wrapped by this type.

use thiserror::Error;

/// Result type alias for setup operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
