//! # notesync Store Contracts
//!
//! The external collaborators the sync engine is built against.
//!
//! This crate provides:
//! - `RemoteStore`: durable keyed record storage with a zone lifecycle,
//!   optimistic conditional writes, and a token-based change feed
//! - `ChangeTokenStore`: durable persistence for one change token and a
//!   handful of boolean flags
//! - In-memory implementations of both, complete enough to model every
//!   contract outcome (conflicts, missing zones, paged feeds) in tests
//!
//! The engine takes these as injected dependencies, so any backend that can
//! honor the contracts can stand in for the real record service.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod remote;
mod token_store;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryRemoteStore, MemoryTokenStore};
pub use remote::{RemoteStore, WriteOutcome};
pub use token_store::ChangeTokenStore;
