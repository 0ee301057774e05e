//! Dedup ledger record

use super::{DestinationId, MessageId};
use chrono::{DateTime, Utc};

/// One imported item: maps a source identity to the destination message it
/// became. At most one record exists per identity; once present the item
/// is never imported again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupRecord {
    pub message_id: MessageId,
    pub destination_id: DestinationId,
    pub imported_at: DateTime<Utc>,
}

impl DedupRecord {
    pub fn new(
        message_id: MessageId,
        destination_id: DestinationId,
        imported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            message_id,
            destination_id,
            imported_at,
        }
    }
}
