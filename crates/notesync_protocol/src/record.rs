//! The remotely stored note record and its body codec.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;

/// The schema version this build writes and the newest version it can read.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors from decoding or encoding a record body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The record was written by a newer schema than this reader supports.
    ///
    /// The payload must not be coerced or truncated; callers surface this so
    /// the user can be prompted to upgrade instead of silently losing data.
    #[error("record schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found on the record.
        found: u32,
        /// Newest version this reader supports.
        supported: u32,
    },

    /// The record carries no body payload at all.
    #[error("record has no body payload")]
    MissingBody,

    /// The body payload is present but not decodable.
    #[error("malformed record body: {0}")]
    Malformed(String),
}

/// Identity of a record in the remote store.
///
/// The engine works with a single well-known identity; the type exists so
/// feed records for other identities can be filtered out defensively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record identity from a well-known name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned optimistic-concurrency tag.
///
/// A conditional write succeeds only if the tag it carries still matches the
/// store's current tag for the record. The tag value itself is store-internal;
/// the engine only carries it forward from the last record it adopted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeTag(pub u64);

impl ChangeTag {
    /// Tag carried by a record that has never been persisted.
    ///
    /// Writing with this tag asks the store to create the record.
    pub const UNSAVED: ChangeTag = ChangeTag(0);

    /// Returns true if the record has never been persisted.
    pub fn is_unsaved(&self) -> bool {
        self.0 == Self::UNSAVED.0
    }
}

/// The CBOR-encoded payload carried inside a record body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteBody {
    /// The note text.
    pub text: String,
}

/// A single versioned, timestamped note record.
///
/// This is both the wire-shaped record exchanged with the remote store and
/// the engine's handle for conditional updates: the last adopted `Record`
/// carries the [`ChangeTag`] needed to write against it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record identity.
    pub id: RecordId,
    /// Schema version stamped on the record by its writer.
    pub schema_version: u32,
    /// CBOR-encoded [`NoteBody`], absent on corrupt or skeleton records.
    pub body: Option<Vec<u8>>,
    /// Modification timestamp set by the writing device.
    pub modified_at: Option<SystemTime>,
    /// Optimistic-concurrency tag assigned by the store.
    pub change_tag: ChangeTag,
}

impl Record {
    /// Creates a skeleton record that has never been persisted.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            schema_version: SCHEMA_VERSION,
            body: None,
            modified_at: None,
            change_tag: ChangeTag::UNSAVED,
        }
    }

    /// Returns a copy of this record carrying the given note.
    ///
    /// The body is re-encoded, `modified_at` replaced, and the schema version
    /// stamped to [`SCHEMA_VERSION`]; the change tag is kept so the result is
    /// writable against the same base.
    pub fn with_note(&self, text: &str, modified_at: SystemTime) -> Result<Record, RecordError> {
        let body = NoteBody {
            text: text.to_owned(),
        };
        let mut bytes = Vec::new();
        ciborium::into_writer(&body, &mut bytes)
            .map_err(|e| RecordError::Malformed(e.to_string()))?;
        Ok(Record {
            id: self.id.clone(),
            schema_version: SCHEMA_VERSION,
            body: Some(bytes),
            modified_at: Some(modified_at),
            change_tag: self.change_tag,
        })
    }

    /// Decodes the note text, guarding the schema version.
    ///
    /// Fails with [`RecordError::UnsupportedVersion`] before touching the
    /// body if the record comes from a newer schema.
    pub fn note_text(&self, supported: u32) -> Result<String, RecordError> {
        if self.schema_version > supported {
            return Err(RecordError::UnsupportedVersion {
                found: self.schema_version,
                supported,
            });
        }
        let bytes = self.body.as_deref().ok_or(RecordError::MissingBody)?;
        let body: NoteBody =
            ciborium::from_reader(bytes).map_err(|e| RecordError::Malformed(e.to_string()))?;
        Ok(body.text)
    }
}
