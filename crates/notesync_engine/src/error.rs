//! Error types for the sync engine.

use notesync_protocol::RecordError;
use notesync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced by load and save.
///
/// Conflicts and missing zones are normally resolved internally; the
/// variants here appear only when the single bounded retry also failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The note record does not exist remotely.
    ///
    /// Expected on first run; callers should treat it as "nothing to show
    /// yet", not as a failure worth an error log.
    #[error("note record not found")]
    NotFound,

    /// The remote record was written by a newer schema version.
    ///
    /// Surfaced distinctly so the host can prompt for an upgrade instead
    /// of silently losing data.
    #[error("record schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found on the record.
        found: u32,
        /// Newest version this build supports.
        supported: u32,
    },

    /// The remote record exists but its payload is unreadable.
    #[error("record is corrupt: {0}")]
    Corrupt(String),

    /// A conditional write conflicted again after the rebase retry.
    ///
    /// Indicates rapid concurrent writers; the edit stays dirty and the
    /// scheduler retries naturally on a later tick.
    #[error("conditional write conflicted again after rebase")]
    Conflict,

    /// The record zone was still missing after creating it once.
    #[error("record zone still missing after creating it")]
    ZoneMissing,

    /// Network or store failure, including store-side timeouts.
    #[error("transport error: {0}")]
    Transport(String),

    /// The change-token store failed to persist.
    #[error("change token store error: {0}")]
    TokenStore(String),
}

impl SyncError {
    /// Returns true for the expected first-run "nothing there yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound)
    }
}

impl From<StoreError> for SyncError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => SyncError::NotFound,
            StoreError::ZoneNotFound => SyncError::ZoneMissing,
            StoreError::Transport(message) => SyncError::Transport(message),
        }
    }
}

impl From<RecordError> for SyncError {
    fn from(error: RecordError) -> Self {
        match error {
            RecordError::UnsupportedVersion { found, supported } => {
                SyncError::UnsupportedVersion { found, supported }
            }
            RecordError::MissingBody => SyncError::Corrupt("record has no body payload".into()),
            RecordError::Malformed(message) => SyncError::Corrupt(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_conversion() {
        assert_eq!(SyncError::from(StoreError::NotFound), SyncError::NotFound);
        assert_eq!(
            SyncError::from(StoreError::ZoneNotFound),
            SyncError::ZoneMissing
        );
        assert_eq!(
            SyncError::from(StoreError::transport("offline")),
            SyncError::Transport("offline".into())
        );
    }

    #[test]
    fn record_error_conversion() {
        assert_eq!(
            SyncError::from(RecordError::UnsupportedVersion {
                found: 2,
                supported: 1
            }),
            SyncError::UnsupportedVersion {
                found: 2,
                supported: 1
            }
        );
        assert!(matches!(
            SyncError::from(RecordError::MissingBody),
            SyncError::Corrupt(_)
        ));
    }

    #[test]
    fn not_found_predicate() {
        assert!(SyncError::NotFound.is_not_found());
        assert!(!SyncError::Conflict.is_not_found());
    }
}
