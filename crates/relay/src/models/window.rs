//! Sync mode and time window types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sync mode: same engine, different look-back and cadence.
///
/// Fast runs often with a short look-back; deep runs rarely with a long
/// one to catch items that surfaced late in the source. Each mode owns its
/// own checkpoint; both share the dedup ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Fast,
    Deep,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Fast => "fast",
            SyncMode::Deep => "deep",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The half-open time range `[start, end)` of source timestamps eligible
/// for import in one pass. Recomputed every pass, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether a source timestamp is eligible for import in this window
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// An empty window covers no timestamps at all (grace exceeding the
    /// look-back produces one)
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}
