//! Change notification to the consuming surface.

use crate::engine::NoteSnapshot;
use parking_lot::RwLock;

type NoteCallback = Box<dyn Fn(&NoteSnapshot) + Send + Sync>;

/// A single-consumer callback fired when the note changed remotely.
///
/// The engine invokes the callback whenever its snapshot changes for a
/// reason other than the consumer's own just-issued edit: a server-wins
/// conflict resolution or an incoming feed record. Only the latest snapshot
/// matters; intermediate states may be coalesced by the consumer.
///
/// Callbacks are delivered on whichever thread performed the mutation (the
/// scheduler thread for save-time adoption, the signal thread for pulls).
/// The core is context-agnostic; hosts that need a particular execution
/// context hop to it inside the callback.
#[derive(Default)]
pub struct ChangeObserver {
    callback: RwLock<Option<NoteCallback>>,
}

impl ChangeObserver {
    /// Creates an observer with no registered callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the callback, replacing any previous one.
    pub fn register(&self, callback: impl Fn(&NoteSnapshot) + Send + Sync + 'static) {
        *self.callback.write() = Some(Box::new(callback));
    }

    /// Removes the registered callback.
    pub fn clear(&self) {
        *self.callback.write() = None;
    }

    /// Delivers a snapshot to the registered callback, if any.
    pub fn notify(&self, snapshot: &NoteSnapshot) {
        if let Some(callback) = &*self.callback.read() {
            callback(snapshot);
        }
    }
}
