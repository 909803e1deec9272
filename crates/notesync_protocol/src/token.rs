//! Opaque change-feed cursors and feed pages.

use crate::record::Record;

/// An opaque cursor into the remote change feed.
///
/// Tokens are minted by the store and only ever handed back to it; the core
/// never interprets the bytes. Absence of a token means "full resync from
/// the beginning of the feed".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeToken(Vec<u8>);

impl ChangeToken {
    /// Wraps store-minted token bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw token bytes for persistence.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// One page of the remote change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangePage {
    /// Records changed since the requested token, in feed order.
    pub records: Vec<Record>,
    /// Cursor marking the end of this page.
    ///
    /// Persisting it after processing the page makes a crashed pull resume
    /// here instead of restarting.
    pub token: ChangeToken,
    /// True if more pages are available after this one.
    pub has_more: bool,
}

impl ChangePage {
    /// Creates a change page.
    pub fn new(records: Vec<Record>, token: ChangeToken, has_more: bool) -> Self {
        Self {
            records,
            token,
            has_more,
        }
    }
}
