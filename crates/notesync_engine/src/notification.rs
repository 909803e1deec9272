//! Push-signal driven incremental pulls.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use notesync_store::{ChangeTokenStore, RemoteStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Resets the pulling flag when the pull ends, however it ends.
struct PullingGuard<'a>(&'a AtomicBool);

impl Drop for PullingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Key under which "a change subscription exists" is persisted.
const SUBSCRIPTION_FLAG: &str = "subscription-registered";

/// Outcome of one push signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The feed was drained to its end.
    Completed {
        /// Records fed to the engine during this pull.
        applied: usize,
    },
    /// The pull stopped early on an error.
    ///
    /// The token stays at its last persisted value, so the next signal
    /// resumes without losing changes; at worst already-applied records
    /// are re-delivered, which apply-remote-change tolerates.
    Stopped {
        /// Records fed to the engine before stopping.
        applied: usize,
    },
    /// A pull was already running; this signal coalesced into it.
    AlreadyPulling,
}

/// Turns push signals into incremental pulls of the remote change feed.
///
/// Each signal pulls pages starting at the last persisted change token,
/// feeds every changed record to the engine, and advances the token after
/// each fully processed page.
pub struct NotificationBridge<S: RemoteStore, K: ChangeTokenStore> {
    store: Arc<S>,
    tokens: Arc<K>,
    engine: Arc<SyncEngine<S>>,
    pulling: AtomicBool,
}

impl<S: RemoteStore, K: ChangeTokenStore> NotificationBridge<S, K> {
    /// Creates a bridge over the engine's store and a token store.
    pub fn new(engine: Arc<SyncEngine<S>>, store: Arc<S>, tokens: Arc<K>) -> Self {
        Self {
            store,
            tokens,
            engine,
            pulling: AtomicBool::new(false),
        }
    }

    /// Handles one received push signal.
    ///
    /// Idempotent and re-entrant-safe: overlapping signals coalesce into
    /// the pull already in progress instead of starting a second one.
    pub fn on_signal(&self) -> PullOutcome {
        if self.pulling.swap(true, Ordering::SeqCst) {
            debug!("pull already in progress, coalescing signal");
            return PullOutcome::AlreadyPulling;
        }
        // Reset on unwind too, so a panicking store cannot wedge the
        // bridge into dropping every future signal.
        let _guard = PullingGuard(&self.pulling);
        self.pull_to_end()
    }

    /// Returns true once a change subscription has been registered.
    ///
    /// A token-store read failure reads as "not registered" so the host
    /// re-registers, which the subscription API tolerates.
    pub fn subscription_registered(&self) -> bool {
        self.tokens.flag(SUBSCRIPTION_FLAG).unwrap_or(false)
    }

    /// Persists that a change subscription has been registered.
    pub fn mark_subscription_registered(&self) -> SyncResult<()> {
        self.tokens
            .set_flag(SUBSCRIPTION_FLAG, true)
            .map_err(|e| SyncError::TokenStore(e.to_string()))
    }

    fn pull_to_end(&self) -> PullOutcome {
        let mut token = match self.tokens.token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "cannot read change token, skipping pull");
                return PullOutcome::Stopped { applied: 0 };
            }
        };

        let mut applied = 0;
        loop {
            let page = match self.store.pull_changes(token.as_ref()) {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, applied, "incremental pull stopped early");
                    return PullOutcome::Stopped { applied };
                }
            };

            let page_len = page.records.len();
            for record in page.records {
                self.engine.apply_remote_change(record);
            }
            applied += page_len;

            // Persist before moving on so a crash resumes at this page
            // boundary instead of restarting the feed.
            if let Err(e) = self.tokens.set_token(&page.token) {
                warn!(error = %e, applied, "failed to persist change token, stopping pull");
                return PullOutcome::Stopped { applied };
            }

            let has_more = page.has_more;
            token = Some(page.token);
            if !has_more {
                break;
            }
        }

        debug!(applied, "incremental pull complete");
        PullOutcome::Completed { applied }
    }
}
