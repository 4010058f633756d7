//! Error types for footfall-store.

use std::path::PathBuf;

/// Result type for footfall-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in footfall-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Record not found in database.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: i64 },

    /// A stored value could not be mapped back to a model.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Caller-supplied parameters are out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: i64) -> Self {
        Error::NotFound { kind, id }
    }

    /// Whether this error means the requested record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
