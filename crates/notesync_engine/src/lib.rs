//! # notesync Engine
//!
//! Single-record, multi-device synchronization for one logical note.
//!
//! This crate provides:
//! - `SyncEngine`: the canonical in-memory note snapshot with load, save
//!   with conflict resolution, and apply-incoming-change
//! - `NotificationBridge`: push-signal driven incremental pulls with a
//!   persisted change token
//! - `DirtyScheduler`: interval timer turning local edits into saves
//! - `ChangeObserver`: tells the consumer when the snapshot changed for a
//!   reason other than its own edit
//!
//! ## Architecture
//!
//! Local edits mark a dirty flag; the scheduler periodically asks the
//! engine to save. Saves use optimistic concurrency against the remote
//! store, resolving conflicts **last-writer-wins by modification time**
//! (ties go to the server). Independently, push signals drive paged pulls
//! of the remote change feed into the engine.
//!
//! ## Key Invariants
//!
//! - At most one save and one pull mutate engine state at a time
//! - An edit made while a save is in flight is never lost
//! - The change token only advances past fully processed feed pages
//! - Records from a newer schema version are rejected, never truncated

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod notification;
mod observer;
mod scheduler;

pub use config::EngineConfig;
pub use engine::{NoteSnapshot, SaveOutcome, SyncEngine, TickOutcome};
pub use error::{SyncError, SyncResult};
pub use notification::{NotificationBridge, PullOutcome};
pub use observer::ChangeObserver;
pub use scheduler::DirtyScheduler;
