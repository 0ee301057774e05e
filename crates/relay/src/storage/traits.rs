//! Storage trait definitions for durable sync state

use crate::error::StorageError;
use crate::models::{DedupRecord, MessageId, SyncMode};
use chrono::{DateTime, Utc};

/// Durable ledger of source identities already imported.
///
/// Append-only, keyed by identity. Reads and writes must be safe under
/// concurrent passes: overlapping fast and deep windows see the same
/// identities.
pub trait DedupLedger: Send + Sync {
    /// Whether this identity has already been imported
    fn contains(&self, id: &MessageId) -> Result<bool, StorageError>;

    /// Record an imported item.
    ///
    /// Idempotent: recording an identity that is already present is a
    /// no-op, not an error, and the original record is kept.
    fn record(&self, record: DedupRecord) -> Result<(), StorageError>;

    /// Look up the full record for an identity
    fn get_record(&self, id: &MessageId) -> Result<Option<DedupRecord>, StorageError>;

    /// Number of identities in the ledger
    fn count(&self) -> Result<usize, StorageError>;
}

/// Durable per-mode high-water mark.
///
/// A `set_checkpoint` must be visible to the next `get_checkpoint` for the
/// same mode; the engine's monotonic-checkpoint invariant depends on it.
pub trait CheckpointStore: Send + Sync {
    /// Last successful window end for a mode, if any pass has completed
    fn get_checkpoint(&self, mode: SyncMode) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Persist a new checkpoint for a mode (upsert)
    fn set_checkpoint(&self, mode: SyncMode, at: DateTime<Utc>) -> Result<(), StorageError>;
}

/// Combined state store as the engine consumes it
pub trait StateStore: DedupLedger + CheckpointStore {}

impl<T: DedupLedger + CheckpointStore> StateStore for T {}
