//! # notesync Protocol
//!
//! Record shapes and codecs for the notesync engine.
//!
//! This crate provides:
//! - `Record` for the single remotely stored note
//! - `NoteBody` CBOR payload encoding/decoding with a schema version guard
//! - `ChangeToken` opaque change-feed cursors
//! - `ChangePage` for paged change-feed pulls
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod record;
mod token;

pub use record::{ChangeTag, NoteBody, Record, RecordError, RecordId, SCHEMA_VERSION};
pub use token::{ChangePage, ChangeToken};
