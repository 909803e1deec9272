//! The sync engine: load, save with conflict resolution, apply-remote-change.

use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::observer::ChangeObserver;
use notesync_protocol::{Record, RecordError};
use notesync_store::{RemoteStore, StoreError, WriteOutcome};
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// The engine's canonical view of the note.
///
/// Both fields are `None` until the first successful load or save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteSnapshot {
    /// The note text.
    pub text: Option<String>,
    /// When the note was last modified, as stamped by the writing device.
    pub modified_at: Option<SystemTime>,
}

/// How a successful save concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The local edit landed remotely.
    Saved,
    /// A newer server record was adopted and the local edit discarded.
    ///
    /// The edit was superseded, not lost in error: the caller should clear
    /// its dirty state rather than re-attempt the write.
    RemoteWon,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing dirty; no save attempted.
    Clean,
    /// A save was already running; this tick was skipped, not queued.
    SaveInFlight,
    /// A save ran to completion.
    Saved(SaveOutcome),
    /// The save failed; the edit stays dirty for a later tick.
    Failed,
}

/// Mutable state guarded by the engine's single serialization point.
struct EngineState {
    /// Canonical local view; replaced, never destroyed.
    snapshot: NoteSnapshot,
    /// The last adopted remote record, carrying the change tag needed for
    /// conditional writes. `None` until first load or save.
    handle: Option<Record>,
}

/// Keeps the single note consistent with its remote record.
///
/// All mutations of the snapshot and record handle go through one mutex, so
/// at most one save and one apply-remote-change run at a time even when the
/// host delivers timer ticks and push signals concurrently.
pub struct SyncEngine<S: RemoteStore> {
    store: Arc<S>,
    config: EngineConfig,
    state: Mutex<EngineState>,
    observer: ChangeObserver,
    /// Latest editor text, replaced on every edit.
    draft: Mutex<Option<String>>,
    /// Set on every edit, cleared only after a save of that edit succeeds.
    dirty: AtomicBool,
    /// Guards against overlapping saves; never persisted.
    save_in_flight: AtomicBool,
    /// Bumped on every edit so an edit interleaved with an in-flight save
    /// keeps the dirty flag set.
    edit_generation: AtomicU64,
}

impl<S: RemoteStore> SyncEngine<S> {
    /// Creates an engine over the given remote store.
    pub fn new(config: EngineConfig, store: Arc<S>) -> Self {
        Self {
            store,
            config,
            state: Mutex::new(EngineState {
                snapshot: NoteSnapshot::default(),
                handle: None,
            }),
            observer: ChangeObserver::new(),
            draft: Mutex::new(None),
            dirty: AtomicBool::new(false),
            save_in_flight: AtomicBool::new(false),
            edit_generation: AtomicU64::new(0),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a consistent copy of the current snapshot for display.
    pub fn snapshot(&self) -> NoteSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Registers the callback fired when the snapshot changes remotely.
    pub fn observe(&self, callback: impl Fn(&NoteSnapshot) + Send + Sync + 'static) {
        self.observer.register(callback);
    }

    /// Returns true if an edit is awaiting a successful save.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Records a local edit and marks it pending.
    pub fn update_text(&self, text: impl Into<String>) {
        *self.draft.lock() = Some(text.into());
        self.mark_dirty();
    }

    /// Marks the current draft as needing a save.
    pub fn mark_dirty(&self) {
        self.edit_generation.fetch_add(1, Ordering::SeqCst);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Hydrates the snapshot from the remote record.
    ///
    /// Fails with [`SyncError::NotFound`] when nothing has been saved yet
    /// (expected on first run), [`SyncError::UnsupportedVersion`] for a
    /// future-schema record, and [`SyncError::Corrupt`] for an unreadable
    /// payload. On any failure the held snapshot and handle are untouched.
    pub fn load(&self) -> SyncResult<NoteSnapshot> {
        let record = match self.store.fetch(&self.config.record_id) {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                debug!(id = %self.config.record_id, "no remote record yet");
                return Err(SyncError::NotFound);
            }
            Err(e) => return Err(e.into()),
        };

        let text = record.note_text(self.config.supported_version)?;
        let snapshot = NoteSnapshot {
            text: Some(text),
            modified_at: record.modified_at,
        };

        let mut state = self.state.lock();
        state.handle = Some(record);
        state.snapshot = snapshot.clone();
        Ok(snapshot)
    }

    /// Saves the given text under optimistic concurrency.
    ///
    /// Conflicts resolve last-writer-wins by `modified_at`: if the local
    /// timestamp is strictly later the write is rebased onto the server
    /// record and retried once; otherwise the server record is adopted, the
    /// observer notified, and [`SaveOutcome::RemoteWon`] returned so the
    /// caller clears its dirty state instead of re-attempting.
    ///
    /// A write into a missing zone creates the zone and retries once.
    pub fn save(&self, text: &str, modified_at: SystemTime) -> SyncResult<SaveOutcome> {
        let mut state = self.state.lock();

        let held = match state.handle.clone() {
            Some(handle) => handle,
            None => {
                let handle = self.adopt_or_create_handle()?;
                state.handle = Some(handle.clone());
                handle
            }
        };

        let mut attempt = held.with_note(text, modified_at)?;
        let mut rebased = false;
        let mut zone_created = false;

        loop {
            match self.store.conditional_write(&attempt) {
                Ok(WriteOutcome::Saved(saved)) => {
                    state.handle = Some(saved);
                    state.snapshot = NoteSnapshot {
                        text: Some(text.to_owned()),
                        modified_at: Some(modified_at),
                    };
                    return Ok(SaveOutcome::Saved);
                }
                Ok(WriteOutcome::Conflict { server, .. }) => {
                    if local_wins(modified_at, &server) {
                        if rebased {
                            // Rapid concurrent writers; leave the retry to
                            // the next scheduler tick.
                            return Err(SyncError::Conflict);
                        }
                        debug!("server copy is older, rebasing local write");
                        attempt = server.with_note(text, modified_at)?;
                        rebased = true;
                    } else {
                        return self.adopt_server_record(state, server);
                    }
                }
                Err(StoreError::ZoneNotFound) => {
                    if zone_created {
                        return Err(SyncError::ZoneMissing);
                    }
                    debug!("record zone missing, creating it");
                    self.store.create_zone()?;
                    zone_created = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Applies one record from the remote change feed.
    ///
    /// Records for other identities or older schema versions are ignored;
    /// undecodable records are skipped so a bad record never blocks feed
    /// progress. Idempotent per record identity and version.
    pub fn apply_remote_change(&self, record: Record) {
        let mut state = self.state.lock();

        if record.id != self.config.record_id {
            debug!(id = %record.id, "ignoring change for unknown record");
            return;
        }
        if let Some(held) = &state.handle {
            if record.schema_version < held.schema_version {
                debug!(
                    incoming = record.schema_version,
                    held = held.schema_version,
                    "ignoring change from older schema version"
                );
                return;
            }
        }

        match record.note_text(self.config.supported_version) {
            Ok(text) => {
                let snapshot = NoteSnapshot {
                    text: Some(text),
                    modified_at: record.modified_at,
                };
                state.snapshot = snapshot.clone();
                state.handle = Some(record);
                drop(state);
                self.observer.notify(&snapshot);
            }
            Err(e) => {
                debug!(error = %e, "skipping undecodable change record");
            }
        }
    }

    /// Runs one scheduler tick: save the pending edit, if any.
    ///
    /// Skips when clean or when a save is already in flight (the tick is
    /// dropped, never queued). Text and timestamp are snapshotted at save
    /// start, so an edit arriving during the save keeps the dirty flag set
    /// and is picked up by a later tick.
    pub fn save_pending(&self) -> TickOutcome {
        if !self.dirty.load(Ordering::SeqCst) {
            return TickOutcome::Clean;
        }
        if self.save_in_flight.swap(true, Ordering::SeqCst) {
            return TickOutcome::SaveInFlight;
        }

        let generation = self.edit_generation.load(Ordering::SeqCst);
        let draft = self.draft.lock().clone();
        let outcome = match draft {
            None => {
                // Dirty without any recorded text; nothing to write.
                self.dirty.store(false, Ordering::SeqCst);
                TickOutcome::Clean
            }
            Some(text) => match self.save(&text, SystemTime::now()) {
                Ok(saved) => {
                    if self.edit_generation.load(Ordering::SeqCst) == generation {
                        self.dirty.store(false, Ordering::SeqCst);
                    }
                    TickOutcome::Saved(saved)
                }
                Err(e) => {
                    warn!(error = %e, "save failed, edit stays pending for the next tick");
                    TickOutcome::Failed
                }
            },
        };
        self.save_in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    /// Fetches the well-known record, or synthesizes a fresh one when the
    /// store has never seen it.
    fn adopt_or_create_handle(&self) -> SyncResult<Record> {
        match self.store.fetch(&self.config.record_id) {
            Ok(record) => Ok(record),
            Err(StoreError::NotFound) => {
                debug!(id = %self.config.record_id, "no remote record yet, creating one");
                Ok(Record::new(self.config.record_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Adopts the server record after losing a conflict.
    ///
    /// A future-schema winner is surfaced untouched so the host can prompt
    /// for an upgrade. A winner with an unreadable payload has its change
    /// tag adopted before the error is surfaced; the edit stays dirty, and
    /// its next save writes over the unreadable record instead of
    /// re-conflicting against it on every tick.
    fn adopt_server_record(
        &self,
        mut state: MutexGuard<'_, EngineState>,
        server: Record,
    ) -> SyncResult<SaveOutcome> {
        let text = match server.note_text(self.config.supported_version) {
            Ok(text) => text,
            Err(e @ RecordError::UnsupportedVersion { .. }) => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "winning server record is unreadable, adopting its change tag");
                state.handle = Some(server);
                return Err(e.into());
            }
        };
        let snapshot = NoteSnapshot {
            text: Some(text),
            modified_at: server.modified_at,
        };
        state.snapshot = snapshot.clone();
        state.handle = Some(server);
        drop(state);

        debug!("server copy is newer, local edit superseded");
        self.observer.notify(&snapshot);
        Ok(SaveOutcome::RemoteWon)
    }
}

/// Last-writer-wins comparison; equal timestamps go to the server.
fn local_wins(local: SystemTime, server: &Record) -> bool {
    match server.modified_at {
        Some(server_time) => local > server_time,
        None => true,
    }
}
