//! Configuration for the sync engine.

use notesync_protocol::{RecordId, SCHEMA_VERSION};
use std::time::Duration;

/// Configuration for the engine and its scheduler.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Well-known identity of the single note record.
    pub record_id: RecordId,
    /// Newest schema version this build can read.
    pub supported_version: u32,
    /// Interval between dirty-flag checks.
    pub save_interval: Duration,
}

impl EngineConfig {
    /// Creates a configuration for the given well-known record name.
    pub fn new(record_name: impl Into<String>) -> Self {
        Self {
            record_id: RecordId::new(record_name),
            supported_version: SCHEMA_VERSION,
            save_interval: Duration::from_secs(5),
        }
    }

    /// Sets the newest supported schema version.
    pub fn with_supported_version(mut self, version: u32) -> Self {
        self.supported_version = version;
        self
    }

    /// Sets the scheduler interval.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("note")
    }
}
