//! The periodic dirty-flag scheduler.

use crate::engine::SyncEngine;
use notesync_store::RemoteStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::trace;

/// Drives periodic saves of pending edits.
///
/// Fires [`SyncEngine::save_pending`] on the engine's configured interval
/// from a background thread. Ticks that land while a save is running are
/// dropped, not queued; the save-in-flight guard lives in the engine, so at
/// most one save executes at any instant no matter how ticks and manual
/// calls interleave.
///
/// Dropping the scheduler stops the thread promptly and joins it.
pub struct DirtyScheduler {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DirtyScheduler {
    /// Starts ticking against the given engine.
    pub fn start<S: RemoteStore + 'static>(engine: Arc<SyncEngine<S>>) -> Self {
        let interval = engine.config().save_interval;
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);

        let handle = std::thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                std::thread::park_timeout(interval);
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let outcome = engine.save_pending();
                trace!(?outcome, "scheduler tick");
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stops the scheduler and waits for the thread to exit.
    pub fn stop(self) {
        // Drop does the work.
    }
}

impl Drop for DirtyScheduler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use notesync_store::MemoryRemoteStore;
    use std::time::{Duration, Instant};

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn scheduler_saves_pending_edit() {
        let store = Arc::new(MemoryRemoteStore::new());
        let engine = Arc::new(SyncEngine::new(
            EngineConfig::new("note").with_save_interval(Duration::from_millis(10)),
            Arc::clone(&store),
        ));

        engine.update_text("tick me");
        let scheduler = DirtyScheduler::start(Arc::clone(&engine));

        assert!(wait_until(Duration::from_secs(2), || !engine.is_dirty()));
        scheduler.stop();

        assert_eq!(engine.snapshot().text.as_deref(), Some("tick me"));
        assert!(store.record().is_some());
    }

    #[test]
    fn scheduler_is_idle_without_edits() {
        let store = Arc::new(MemoryRemoteStore::new());
        let engine = Arc::new(SyncEngine::new(
            EngineConfig::new("note").with_save_interval(Duration::from_millis(5)),
            Arc::clone(&store),
        ));

        let scheduler = DirtyScheduler::start(Arc::clone(&engine));
        std::thread::sleep(Duration::from_millis(50));
        scheduler.stop();

        assert!(store.record().is_none());
        assert!(!store.zone_created());
    }

    #[test]
    fn stop_is_prompt() {
        let store = Arc::new(MemoryRemoteStore::new());
        let engine = Arc::new(SyncEngine::new(
            EngineConfig::new("note").with_save_interval(Duration::from_secs(3600)),
            Arc::clone(&store),
        ));

        let scheduler = DirtyScheduler::start(engine);
        let start = Instant::now();
        scheduler.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
