//! Integration tests wiring the engine, bridge, and scheduler against the
//! in-memory store doubles.

use notesync_engine::{
    EngineConfig, NoteSnapshot, NotificationBridge, PullOutcome, SaveOutcome, SyncEngine,
    TickOutcome,
};
use notesync_protocol::{Record, RecordId, SCHEMA_VERSION};
use notesync_store::{MemoryRemoteStore, MemoryTokenStore, RemoteStore};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn note_id() -> RecordId {
    RecordId::new("note")
}

fn ts(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// One device: an engine and a bridge sharing the remote store, with its
/// own change-token store.
fn device(
    store: &Arc<MemoryRemoteStore>,
) -> (
    Arc<SyncEngine<MemoryRemoteStore>>,
    NotificationBridge<MemoryRemoteStore, MemoryTokenStore>,
) {
    let engine = Arc::new(SyncEngine::new(EngineConfig::new("note"), Arc::clone(store)));
    let tokens = Arc::new(MemoryTokenStore::new());
    let bridge = NotificationBridge::new(Arc::clone(&engine), Arc::clone(store), tokens);
    (engine, bridge)
}

#[test]
fn two_devices_converge() {
    let store = Arc::new(MemoryRemoteStore::new());
    let (engine_a, bridge_a) = device(&store);
    let (engine_b, bridge_b) = device(&store);

    // Device A writes first.
    engine_a.update_text("written on A");
    assert_eq!(
        engine_a.save_pending(),
        TickOutcome::Saved(SaveOutcome::Saved)
    );

    // Device B hears about it via a push signal.
    let remote_updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&remote_updates);
    engine_b.observe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(matches!(
        bridge_b.on_signal(),
        PullOutcome::Completed { applied: 1 }
    ));
    assert_eq!(engine_b.snapshot().text.as_deref(), Some("written on A"));
    assert_eq!(remote_updates.load(Ordering::SeqCst), 1);

    // Device B edits on top; A pulls and converges.
    engine_b.update_text("written on B");
    assert_eq!(
        engine_b.save_pending(),
        TickOutcome::Saved(SaveOutcome::Saved)
    );

    assert!(matches!(bridge_a.on_signal(), PullOutcome::Completed { .. }));
    assert_eq!(engine_a.snapshot().text.as_deref(), Some("written on B"));
    assert_eq!(
        store.record().unwrap().note_text(SCHEMA_VERSION).unwrap(),
        "written on B"
    );
}

#[test]
fn resumed_pull_converges_with_full_resync() {
    let store = Arc::new(MemoryRemoteStore::new().with_page_size(2));
    for i in 0..7u64 {
        store
            .write_remote(&note_id(), &format!("edit {i}"), ts(i))
            .unwrap();
    }

    // Device one pulls everything in one go.
    let (full, bridge_full) = device(&store);
    assert_eq!(bridge_full.on_signal(), PullOutcome::Completed { applied: 7 });

    // Device two pulls, then "restarts" with a fresh engine but the same
    // persisted token.
    let resumed_tokens = Arc::new(MemoryTokenStore::new());
    let engine_one = Arc::new(SyncEngine::new(EngineConfig::new("note"), Arc::clone(&store)));
    let bridge_one = NotificationBridge::new(
        Arc::clone(&engine_one),
        Arc::clone(&store),
        Arc::clone(&resumed_tokens),
    );
    assert_eq!(bridge_one.on_signal(), PullOutcome::Completed { applied: 7 });

    // Fresh engine, same token store: nothing before the token reappears.
    let engine_two = Arc::new(SyncEngine::new(EngineConfig::new("note"), Arc::clone(&store)));
    let bridge_two = NotificationBridge::new(
        Arc::clone(&engine_two),
        Arc::clone(&store),
        Arc::clone(&resumed_tokens),
    );
    assert_eq!(bridge_two.on_signal(), PullOutcome::Completed { applied: 0 });

    store.write_remote(&note_id(), "edit 7", ts(7)).unwrap();
    assert_eq!(bridge_two.on_signal(), PullOutcome::Completed { applied: 1 });
    assert_eq!(bridge_full.on_signal(), PullOutcome::Completed { applied: 1 });

    // Both paths converge on the same final snapshot.
    assert_eq!(engine_two.snapshot().text.as_deref(), Some("edit 7"));
    assert_eq!(full.snapshot(), engine_two.snapshot());
}

#[test]
fn future_schema_record_does_not_block_feed() {
    let store = Arc::new(MemoryRemoteStore::new());

    let mut future = Record::new(note_id()).with_note("from v2", ts(1)).unwrap();
    future.schema_version = SCHEMA_VERSION + 1;
    store.seed_record(future);
    store.write_remote(&note_id(), "readable", ts(2)).unwrap();

    let (engine, bridge) = device(&store);
    assert_eq!(bridge.on_signal(), PullOutcome::Completed { applied: 2 });

    // The undecodable record was skipped, the readable one applied.
    assert_eq!(engine.snapshot().text.as_deref(), Some("readable"));
}

#[test]
fn only_one_save_runs_at_a_time() {
    let store = Arc::new(MemoryRemoteStore::new());
    store.create_zone().unwrap();
    let engine = Arc::new(SyncEngine::new(EngineConfig::new("note"), Arc::clone(&store)));
    engine.update_text("contended");

    let entered = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    // Receiver is not Sync; the hook shares it behind a lock.
    let release_rx = Mutex::new(release_rx);
    let counter = Arc::clone(&entered);
    store.set_write_hook(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        entered_tx.send(()).unwrap();
        release_rx.lock().recv().unwrap();
    });

    let saver = Arc::clone(&engine);
    let worker = std::thread::spawn(move || saver.save_pending());

    // With one save parked inside the store, every further tick is skipped.
    entered_rx.recv().unwrap();
    for _ in 0..10 {
        assert_eq!(engine.save_pending(), TickOutcome::SaveInFlight);
    }
    assert_eq!(entered.load(Ordering::SeqCst), 1);

    store.clear_write_hook();
    release_tx.send(()).unwrap();
    assert_eq!(
        worker.join().unwrap(),
        TickOutcome::Saved(SaveOutcome::Saved)
    );
    assert!(!engine.is_dirty());
}

#[test]
fn snapshot_starts_empty() {
    let store = Arc::new(MemoryRemoteStore::new());
    let (engine, _bridge) = device(&store);
    assert_eq!(engine.snapshot(), NoteSnapshot::default());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Last-writer-wins: racing a local write at `local_secs` against a
    /// server record at `server_secs`, the local text survives iff it is
    /// strictly later; ties go to the server.
    #[test]
    fn conflict_resolution_is_last_writer_wins(local_secs in 0u64..512, server_secs in 0u64..512) {
        let store = Arc::new(MemoryRemoteStore::new());
        let engine = SyncEngine::new(EngineConfig::new("note"), Arc::clone(&store));

        store.write_remote(&note_id(), "base", ts(0)).unwrap();
        engine.load().unwrap();

        // A racing device invalidates our change tag.
        store.write_remote(&note_id(), "theirs", ts(server_secs)).unwrap();

        let outcome = engine.save("ours", ts(local_secs)).unwrap();
        let resolved = engine.snapshot();
        let stored = store.record().unwrap().note_text(SCHEMA_VERSION).unwrap();

        if local_secs > server_secs {
            prop_assert_eq!(outcome, SaveOutcome::Saved);
            prop_assert_eq!(resolved.text.as_deref(), Some("ours"));
            prop_assert_eq!(stored, "ours");
            prop_assert_eq!(resolved.modified_at, Some(ts(local_secs)));
        } else {
            prop_assert_eq!(outcome, SaveOutcome::RemoteWon);
            prop_assert_eq!(resolved.text.as_deref(), Some("theirs"));
            prop_assert_eq!(stored, "theirs");
            prop_assert_eq!(resolved.modified_at, Some(ts(server_secs)));
        }
    }
}
