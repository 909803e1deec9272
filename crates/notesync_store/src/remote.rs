//! The remote record store contract.

use crate::error::StoreResult;
use notesync_protocol::{ChangePage, ChangeToken, Record, RecordId};

/// Outcome of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The write landed; the returned record carries the new change tag.
    Saved(Record),
    /// Someone else wrote since the carried tag was observed.
    ///
    /// Both sides of the race are returned so the caller can merge and
    /// retry against the server record.
    Conflict {
        /// The record the caller attempted to write.
        attempted: Record,
        /// The record currently held by the store.
        server: Record,
    },
}

/// A durable keyed record store with optimistic concurrency and a change feed.
///
/// This trait abstracts the remote record service, allowing different
/// backends (a hosted record store, an in-memory double for tests). All
/// calls block until the store answers; timeout behavior is the store's own
/// and surfaces as [`StoreError::Transport`](crate::StoreError::Transport).
pub trait RemoteStore: Send + Sync {
    /// Fetches the record with the given identity.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) if no
    /// such record exists yet.
    fn fetch(&self, id: &RecordId) -> StoreResult<Record>;

    /// Conditionally writes a record.
    ///
    /// The write succeeds only if the record's change tag still matches the
    /// store's current tag (a tag of [`ChangeTag::UNSAVED`] asks for a
    /// create). A mismatch yields [`WriteOutcome::Conflict`]; a write into a
    /// zone that does not exist yet fails with
    /// [`StoreError::ZoneNotFound`](crate::StoreError::ZoneNotFound).
    ///
    /// [`ChangeTag::UNSAVED`]: notesync_protocol::ChangeTag::UNSAVED
    fn conditional_write(&self, record: &Record) -> StoreResult<WriteOutcome>;

    /// Creates the zone that holds the note record.
    ///
    /// Idempotent: creating an existing zone succeeds.
    fn create_zone(&self) -> StoreResult<()>;

    /// Pulls one page of changes recorded after the given token.
    ///
    /// `None` means "from the beginning of the feed". Pages arrive in feed
    /// order and each page's token resumes exactly after it.
    fn pull_changes(&self, since: Option<&ChangeToken>) -> StoreResult<ChangePage>;
}
