//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`RemoteStore`](crate::RemoteStore) or
/// [`ChangeTokenStore`](crate::ChangeTokenStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist.
    ///
    /// Expected on first run, before anything has been saved.
    #[error("record not found")]
    NotFound,

    /// The zone that would contain the record does not exist yet.
    ///
    /// Distinguishable from other failures so the caller can create the
    /// zone and retry the write once.
    #[error("record zone not found")]
    ZoneNotFound,

    /// Network or backend failure, including store-side timeouts.
    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Returns true if this is the expected first-run "nothing there yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}
