//! In-memory state storage
//!
//! Used for tests and for ephemeral deployments where durable state lives
//! elsewhere (or is acceptable to lose between instance restarts).

use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{CheckpointStore, DedupLedger};
use crate::error::StorageError;
use crate::models::{DedupRecord, MessageId, SyncMode};
use chrono::{DateTime, Utc};

/// In-memory implementation of the dedup ledger and checkpoint store
pub struct InMemoryStateStore {
    records: RwLock<HashMap<String, DedupRecord>>,
    checkpoints: RwLock<HashMap<SyncMode, DateTime<Utc>>>,
}

impl InMemoryStateStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            checkpoints: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupLedger for InMemoryStateStore {
    fn contains(&self, id: &MessageId) -> Result<bool, StorageError> {
        let records = self.records.read().unwrap();
        Ok(records.contains_key(id.as_str()))
    }

    fn record(&self, record: DedupRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().unwrap();
        // First write wins; re-recording an identity is a no-op
        records
            .entry(record.message_id.as_str().to_string())
            .or_insert(record);
        Ok(())
    }

    fn get_record(&self, id: &MessageId) -> Result<Option<DedupRecord>, StorageError> {
        let records = self.records.read().unwrap();
        Ok(records.get(id.as_str()).cloned())
    }

    fn count(&self) -> Result<usize, StorageError> {
        let records = self.records.read().unwrap();
        Ok(records.len())
    }
}

impl CheckpointStore for InMemoryStateStore {
    fn get_checkpoint(&self, mode: SyncMode) -> Result<Option<DateTime<Utc>>, StorageError> {
        let checkpoints = self.checkpoints.read().unwrap();
        Ok(checkpoints.get(&mode).copied())
    }

    fn set_checkpoint(&self, mode: SyncMode, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut checkpoints = self.checkpoints.write().unwrap();
        checkpoints.insert(mode, at);
        Ok(())
    }
}
