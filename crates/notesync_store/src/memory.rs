//! In-memory store implementations.
//!
//! These model every outcome of the store contracts (conflicts, missing
//! zones, paged feeds) so engine behavior can be exercised without a real
//! backend. Fault injection is single-shot: an injected failure applies to
//! the next matching call only.

use crate::error::{StoreError, StoreResult};
use crate::remote::{RemoteStore, WriteOutcome};
use crate::token_store::ChangeTokenStore;
use notesync_protocol::{ChangePage, ChangeTag, ChangeToken, Record, RecordId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::SystemTime;

type WriteHook = Box<dyn Fn() + Send + Sync>;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Default)]
struct RemoteInner {
    zone_created: bool,
    record: Option<Record>,
    next_tag: u64,
    feed: Vec<(u64, Record)>,
    next_seq: u64,
    fail_fetch: Option<StoreError>,
    fail_write: Option<StoreError>,
    fail_pull: Option<StoreError>,
}

/// An in-memory [`RemoteStore`] holding a single note record.
///
/// Change tokens are the feed sequence number in little-endian bytes; the
/// engine never looks, but tests can mint resumption points with
/// [`ChangeToken::from_bytes`].
pub struct MemoryRemoteStore {
    inner: Mutex<RemoteInner>,
    page_size: usize,
    write_hook: Mutex<Option<WriteHook>>,
    pull_hook: Mutex<Option<WriteHook>>,
}

impl MemoryRemoteStore {
    /// Creates an empty store with no zone and no record.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RemoteInner {
                next_tag: 1,
                next_seq: 1,
                ..RemoteInner::default()
            }),
            page_size: DEFAULT_PAGE_SIZE,
            write_hook: Mutex::new(None),
            pull_hook: Mutex::new(None),
        }
    }

    /// Sets the change-feed page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Writes a record as if another device had saved it.
    ///
    /// Bumps the change tag and appends to the feed, creating the zone and
    /// record as needed.
    pub fn write_remote(
        &self,
        id: &RecordId,
        text: &str,
        modified_at: SystemTime,
    ) -> StoreResult<Record> {
        let mut inner = self.inner.lock();
        let base = inner
            .record
            .clone()
            .unwrap_or_else(|| Record::new(id.clone()));
        let mut saved = base
            .with_note(text, modified_at)
            .map_err(|e| StoreError::transport(e.to_string()))?;

        inner.zone_created = true;
        saved.change_tag = ChangeTag(inner.next_tag);
        inner.next_tag += 1;
        inner.record = Some(saved.clone());
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.feed.push((seq, saved.clone()));
        Ok(saved)
    }

    /// Seeds the store with an arbitrary record, creating the zone.
    ///
    /// Unlike [`write_remote`](Self::write_remote) the record is stored as
    /// given (schema version included); only the change tag is assigned.
    /// Useful for modeling records written by other schema generations.
    pub fn seed_record(&self, mut record: Record) {
        let mut inner = self.inner.lock();
        inner.zone_created = true;
        record.change_tag = ChangeTag(inner.next_tag);
        inner.next_tag += 1;
        inner.record = Some(record.clone());
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.feed.push((seq, record));
    }

    /// Returns the currently stored record, if any.
    pub fn record(&self) -> Option<Record> {
        self.inner.lock().record.clone()
    }

    /// Returns true if the zone has been created.
    pub fn zone_created(&self) -> bool {
        self.inner.lock().zone_created
    }

    /// Fails the next `fetch` with the given error.
    pub fn fail_next_fetch(&self, error: StoreError) {
        self.inner.lock().fail_fetch = Some(error);
    }

    /// Fails the next `conditional_write` with the given error.
    pub fn fail_next_write(&self, error: StoreError) {
        self.inner.lock().fail_write = Some(error);
    }

    /// Fails the next `pull_changes` with the given error.
    pub fn fail_next_pull(&self, error: StoreError) {
        self.inner.lock().fail_pull = Some(error);
    }

    /// Installs a hook invoked at the start of every conditional write.
    ///
    /// The hook runs outside the store lock, so it may block to hold a
    /// write open while a test observes concurrent behavior.
    pub fn set_write_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.write_hook.lock() = Some(Box::new(hook));
    }

    /// Removes the write hook.
    pub fn clear_write_hook(&self) {
        *self.write_hook.lock() = None;
    }

    /// Installs a hook invoked at the start of every feed pull.
    ///
    /// Like the write hook, it runs outside the store lock and may block.
    pub fn set_pull_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.pull_hook.lock() = Some(Box::new(hook));
    }

    /// Removes the pull hook.
    pub fn clear_pull_hook(&self) {
        *self.pull_hook.lock() = None;
    }

    fn cursor_from(token: Option<&ChangeToken>) -> u64 {
        match token {
            Some(t) => {
                let bytes: Option<[u8; 8]> = t.as_bytes().try_into().ok();
                bytes.map(u64::from_le_bytes).unwrap_or(0)
            }
            None => 0,
        }
    }

    fn token_for(seq: u64) -> ChangeToken {
        ChangeToken::from_bytes(seq.to_le_bytes())
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn fetch(&self, id: &RecordId) -> StoreResult<Record> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.fail_fetch.take() {
            return Err(error);
        }
        match &inner.record {
            Some(record) if record.id == *id => Ok(record.clone()),
            _ => Err(StoreError::NotFound),
        }
    }

    fn conditional_write(&self, record: &Record) -> StoreResult<WriteOutcome> {
        // Run the hook outside both locks so it may block freely.
        let hook = self.write_hook.lock().take();
        if let Some(hook) = hook {
            hook();
            *self.write_hook.lock() = Some(hook);
        }

        let mut inner = self.inner.lock();
        if let Some(error) = inner.fail_write.take() {
            return Err(error);
        }
        if !inner.zone_created {
            return Err(StoreError::ZoneNotFound);
        }

        if let Some(current) = &inner.record {
            if current.change_tag != record.change_tag {
                return Ok(WriteOutcome::Conflict {
                    attempted: record.clone(),
                    server: current.clone(),
                });
            }
        }

        let mut saved = record.clone();
        saved.change_tag = ChangeTag(inner.next_tag);
        inner.next_tag += 1;
        inner.record = Some(saved.clone());
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.feed.push((seq, saved.clone()));
        Ok(WriteOutcome::Saved(saved))
    }

    fn create_zone(&self) -> StoreResult<()> {
        self.inner.lock().zone_created = true;
        Ok(())
    }

    fn pull_changes(&self, since: Option<&ChangeToken>) -> StoreResult<ChangePage> {
        let hook = self.pull_hook.lock().take();
        if let Some(hook) = hook {
            hook();
            *self.pull_hook.lock() = Some(hook);
        }

        let mut inner = self.inner.lock();
        if let Some(error) = inner.fail_pull.take() {
            return Err(error);
        }

        let cursor = Self::cursor_from(since);
        let records: Vec<(u64, Record)> = inner
            .feed
            .iter()
            .filter(|(seq, _)| *seq > cursor)
            .take(self.page_size)
            .cloned()
            .collect();

        let last_seq = records.last().map(|(seq, _)| *seq).unwrap_or(cursor);
        let has_more = inner.feed.iter().any(|(seq, _)| *seq > last_seq);

        Ok(ChangePage::new(
            records.into_iter().map(|(_, r)| r).collect(),
            Self::token_for(last_seq),
            has_more,
        ))
    }
}

#[derive(Default)]
struct TokenInner {
    token: Option<ChangeToken>,
    flags: HashMap<String, bool>,
    fail_set_token: Option<StoreError>,
}

/// An in-memory [`ChangeTokenStore`].
#[derive(Default)]
pub struct MemoryTokenStore {
    inner: Mutex<TokenInner>,
}

impl MemoryTokenStore {
    /// Creates an empty token store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `set_token` with the given error.
    pub fn fail_next_set_token(&self, error: StoreError) {
        self.inner.lock().fail_set_token = Some(error);
    }
}

impl ChangeTokenStore for MemoryTokenStore {
    fn token(&self) -> StoreResult<Option<ChangeToken>> {
        Ok(self.inner.lock().token.clone())
    }

    fn set_token(&self, token: &ChangeToken) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if let Some(error) = inner.fail_set_token.take() {
            return Err(error);
        }
        inner.token = Some(token.clone());
        Ok(())
    }

    fn flag(&self, name: &str) -> StoreResult<bool> {
        Ok(self.inner.lock().flags.get(name).copied().unwrap_or(false))
    }

    fn set_flag(&self, name: &str, value: bool) -> StoreResult<()> {
        self.inner.lock().flags.insert(name.to_owned(), value);
        Ok(())
    }
}
