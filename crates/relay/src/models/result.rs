//! Result summary of a single sync pass

use super::{MessageId, SyncMode, SyncWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single item that failed during a pass.
///
/// Failed items are never marked deduped, so the next pass retries them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub message_id: MessageId,
    pub error: String,
}

impl ItemError {
    pub fn new(message_id: MessageId, error: impl Into<String>) -> Self {
        Self {
            message_id,
            error: error.into(),
        }
    }
}

/// Outcome of one sync pass, returned to the trigger as its status payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub mode: SyncMode,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Items fetched and inside the window (entered per-item processing)
    pub items_seen: usize,
    pub items_imported: usize,
    pub items_skipped_duplicate: usize,
    pub errors: Vec<ItemError>,
    /// True when the per-pass item cap cut the window short
    pub truncated: bool,
    pub duration_ms: u64,
}

impl SyncResult {
    pub fn new(mode: SyncMode, window: &SyncWindow) -> Self {
        Self {
            mode,
            window_start: window.start,
            window_end: window.end,
            items_seen: 0,
            items_imported: 0,
            items_skipped_duplicate: 0,
            errors: Vec::new(),
            truncated: false,
            duration_ms: 0,
        }
    }

    /// A clean pass processed its whole window without item failures; only
    /// clean passes advance the checkpoint.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_test_result() -> SyncResult {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        SyncResult::new(SyncMode::Fast, &SyncWindow::new(start, end))
    }

    #[test]
    fn test_new_result_is_clean() {
        assert!(make_test_result().is_clean());
    }

    #[test]
    fn test_errors_make_result_dirty() {
        let mut result = make_test_result();
        result
            .errors
            .push(ItemError::new(MessageId::new("<a@b>"), "write failed"));
        assert!(!result.is_clean());
    }

    #[test]
    fn test_truncation_makes_result_dirty() {
        let mut result = make_test_result();
        result.truncated = true;
        assert!(!result.is_clean());
    }

    #[test]
    fn test_result_serializes_with_camel_case_keys() {
        let json = serde_json::to_string(&make_test_result()).unwrap();
        assert!(json.contains("\"itemsImported\""));
        assert!(json.contains("\"itemsSkippedDuplicate\""));
        assert!(json.contains("\"windowStart\""));
        assert!(json.contains("\"mode\":\"fast\""));
    }
}
