//! Error types for sounddex

use thiserror::Error;

/// Common result type for sounddex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types across the pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transfer error
    #[error("Network error: {0}")]
    Network(String),

    /// Audio decode or resample error
    #[error("Audio error: {0}")]
    Audio(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a transient store-contention error that is
    /// worth retrying (SQLite lock / busy class).
    pub fn is_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => {
                let text = db_err.to_string();
                text.contains("database is locked") || text.contains("database table is locked")
            }
            _ => false,
        }
    }
}
