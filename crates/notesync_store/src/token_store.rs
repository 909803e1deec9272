//! The change-token persistence contract.

use crate::error::StoreResult;
use notesync_protocol::ChangeToken;

/// Durable persistence for the change-feed cursor and small boolean flags.
///
/// A simple key-value collaborator with last-write-wins semantics; no
/// transactionality is required. The engine persists the token after every
/// processed feed page so a crash mid-feed resumes instead of restarting.
pub trait ChangeTokenStore: Send + Sync {
    /// Returns the last persisted change token, if any.
    fn token(&self) -> StoreResult<Option<ChangeToken>>;

    /// Persists the change token, replacing any previous value.
    fn set_token(&self, token: &ChangeToken) -> StoreResult<()>;

    /// Returns the named flag, defaulting to false when never set.
    fn flag(&self, name: &str) -> StoreResult<bool>;

    /// Persists the named flag.
    fn set_flag(&self, name: &str, value: bool) -> StoreResult<()>;
}
