//! Error types for footfall-analytics.

use thiserror::Error;

/// Errors returned by the analytics layer.
///
/// Cache failures never appear here: a failed lookup is treated as a miss and
/// failed writes are logged and counted.
#[derive(Debug, Error)]
pub enum Error {
    /// The record store could not be read.
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(#[from] footfall_store::Error),

    /// A caller-supplied parameter was rejected before any work was done.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A computed result could not be serialised for the cache.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether the error was caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidParameter { .. })
    }
}

/// Result type alias using footfall-analytics' Error type.
pub type Result<T> = std::result::Result<T, Error>;
