//! Sync engine
//!
//! Runs one bounded pass at a time: compute the window from the stored
//! checkpoint, fetch eligible items, import them oldest first with
//! per-item error isolation, and advance the checkpoint only after a
//! clean pass.

mod window;

pub use window::{compute_window, next_checkpoint};

use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::config::SyncSettings;
use crate::error::{ImportError, SourceError, SyncError};
use crate::models::{
    DedupRecord, DestinationId, ItemError, SourceItem, SyncMode, SyncResult, SyncWindow,
};
use crate::storage::StateStore;

/// Read access to the source mailbox
pub trait SourceReader: Send + Sync {
    /// Fetch items whose source timestamp falls inside the window.
    ///
    /// Implementations may over-fetch at the edges; the engine re-checks
    /// eligibility and ordering before importing.
    fn fetch(&self, window: &SyncWindow) -> Result<Vec<SourceItem>, SourceError>;
}

/// Write access to the destination mailbox
pub trait Importer: Send + Sync {
    /// Validate credentials and warm any per-pass state.
    ///
    /// Called once at the start of every non-empty pass, before any item
    /// is written. A failure here aborts the pass without touching items.
    fn prepare(&self) -> Result<(), ImportError> {
        Ok(())
    }

    /// Write one item to the destination, returning its identity there
    fn write(&self, item: &SourceItem) -> Result<DestinationId, ImportError>;
}

/// Coordinates source, destination and state for sync passes.
///
/// Passes are stateless between invocations: everything a pass needs is
/// read from the state store at the start and written back at the end,
/// so triggers can fire from any process at any cadence.
pub struct SyncEngine {
    source: Arc<dyn SourceReader>,
    importer: Arc<dyn Importer>,
    store: Arc<dyn StateStore>,
    settings: SyncSettings,
}

impl SyncEngine {
    /// Create a new engine
    pub fn new(
        source: Arc<dyn SourceReader>,
        importer: Arc<dyn Importer>,
        store: Arc<dyn StateStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            source,
            importer,
            store,
            settings,
        }
    }

    /// Run a single sync pass in the given mode.
    ///
    /// This operation is idempotent: re-running it over the same window
    /// will not import any item twice. Item-level failures are collected
    /// in the result rather than failing the pass; only source,
    /// destination-preparation and storage failures abort it.
    pub fn run_sync_once(&self, mode: SyncMode) -> Result<SyncResult, SyncError> {
        let started = std::time::Instant::now();
        let now = Utc::now();

        // 1. Compute the window from the stored checkpoint
        let checkpoint = self.store.get_checkpoint(mode)?;
        let window = window::compute_window(mode, checkpoint, now, &self.settings);
        let mut result = SyncResult::new(mode, &window);

        info!(
            "Starting {} sync pass: window {} to {}",
            mode, window.start, window.end
        );

        // 2. Fetch candidates, skipping all remote calls when the window
        //    has already been covered
        let mut items = if window.is_empty() {
            debug!("Window is empty, skipping fetch");
            Vec::new()
        } else {
            self.importer.prepare().map_err(SyncError::Destination)?;
            self.source.fetch(&window)?
        };

        // 3. Keep in-window items, oldest first, bounded by the per-run cap
        items.retain(|item| window.contains(item.received_at));
        items.sort_by_key(|item| item.received_at);
        if items.len() > self.settings.items_per_run {
            warn!(
                "Fetched {} items, capping pass at {}",
                items.len(),
                self.settings.items_per_run
            );
            items.truncate(self.settings.items_per_run);
            result.truncated = true;
        }
        result.items_seen = items.len();

        // 4. Import each item, isolating failures to the item
        for item in &items {
            self.process_item(item, &mut result);
        }

        // 5. Advance the checkpoint only after a clean pass, and never
        //    backwards
        if result.is_clean() {
            let next = window::next_checkpoint(checkpoint, window.end);
            if checkpoint != Some(next) {
                self.store.set_checkpoint(mode, next)?;
                debug!("Advanced {} checkpoint to {}", mode, next);
            }
        } else {
            info!(
                "Leaving {} checkpoint unchanged ({} errors, truncated: {})",
                mode,
                result.errors.len(),
                result.truncated
            );
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Completed {} sync pass in {}ms: {} seen, {} imported, {} duplicate, {} failed",
            mode,
            result.duration_ms,
            result.items_seen,
            result.items_imported,
            result.items_skipped_duplicate,
            result.errors.len()
        );
        Ok(result)
    }

    /// Process one item: dedup check, import, record.
    ///
    /// Any failure lands in `result.errors` and leaves the ledger without
    /// a record for the item, so the next pass retries it.
    fn process_item(&self, item: &SourceItem, result: &mut SyncResult) {
        match self.store.contains(&item.id) {
            Ok(true) => {
                debug!("Skipping {}, already imported", item.id.as_str());
                result.items_skipped_duplicate += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                // Without a trustworthy answer we must not import: that
                // could duplicate the item. Leave it for the next pass.
                warn!("Ledger lookup failed for {}: {}", item.id.as_str(), e);
                result
                    .errors
                    .push(ItemError::new(item.id.clone(), e.to_string()));
                return;
            }
        }

        debug!(
            "Importing {} ({}, received {})",
            item.id.as_str(),
            item.folder.as_str(),
            item.received_at
        );

        let destination_id = match self.importer.write(item) {
            Ok(id) => id,
            Err(ImportError::Duplicate { existing }) => {
                // The destination already has it. Count it as imported and
                // remember the existing identity so we never try again.
                debug!(
                    "Destination already has {} as {}",
                    item.id.as_str(),
                    existing
                );
                existing
            }
            Err(e) => {
                warn!("Import failed for {}: {}", item.id.as_str(), e);
                result
                    .errors
                    .push(ItemError::new(item.id.clone(), e.to_string()));
                return;
            }
        };

        let record = DedupRecord::new(item.id.clone(), destination_id, Utc::now());
        if let Err(e) = self.store.record(record) {
            // Imported but not recorded: the next pass will re-check the
            // destination before writing again.
            warn!("Failed to record import of {}: {}", item.id.as_str(), e);
            result
                .errors
                .push(ItemError::new(item.id.clone(), e.to_string()));
            return;
        }

        result.items_imported += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageId, SourceFolder};
    use crate::storage::{CheckpointStore, DedupLedger, InMemoryStateStore};
    use chrono::{DateTime, Duration};
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct ScriptedSource {
        items: Vec<SourceItem>,
        fetch_calls: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(items: Vec<SourceItem>) -> Self {
            Self {
                items,
                fetch_calls: Mutex::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            *self.fetch_calls.lock().unwrap()
        }
    }

    impl SourceReader for ScriptedSource {
        fn fetch(&self, _window: &SyncWindow) -> Result<Vec<SourceItem>, SourceError> {
            *self.fetch_calls.lock().unwrap() += 1;
            Ok(self.items.clone())
        }
    }

    #[derive(Default)]
    struct ScriptedImporter {
        fail_ids: HashSet<String>,
        duplicate_ids: HashSet<String>,
        prepare_error: Option<String>,
        writes: Mutex<Vec<String>>,
    }

    impl ScriptedImporter {
        fn failing(ids: &[&str]) -> Self {
            Self {
                fail_ids: ids.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        fn written(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl Importer for ScriptedImporter {
        fn prepare(&self) -> Result<(), ImportError> {
            match &self.prepare_error {
                Some(msg) => Err(ImportError::Auth(msg.clone())),
                None => Ok(()),
            }
        }

        fn write(&self, item: &SourceItem) -> Result<DestinationId, ImportError> {
            self.writes
                .lock()
                .unwrap()
                .push(item.id.as_str().to_string());
            if self.fail_ids.contains(item.id.as_str()) {
                return Err(ImportError::Transient("backend unavailable".to_string()));
            }
            if self.duplicate_ids.contains(item.id.as_str()) {
                return Err(ImportError::Duplicate {
                    existing: DestinationId::new(format!("existing-{}", item.id.as_str())),
                });
            }
            Ok(DestinationId::new(format!(
                "dest-{}",
                self.writes.lock().unwrap().len()
            )))
        }
    }

    fn make_item(id: &str, age_hours: i64) -> SourceItem {
        SourceItem::new(
            MessageId::new(id),
            SourceFolder::Inbox,
            Utc::now() - Duration::hours(age_hours),
        )
    }

    fn make_engine(
        source: Arc<ScriptedSource>,
        importer: Arc<ScriptedImporter>,
        store: Arc<InMemoryStateStore>,
        settings: SyncSettings,
    ) -> SyncEngine {
        SyncEngine::new(source, importer, store, settings)
    }

    #[test]
    fn test_first_pass_imports_oldest_first() {
        // Source hands items back newest first
        let source = Arc::new(ScriptedSource::new(vec![
            make_item("<c@x>", 10),
            make_item("<b@x>", 20),
            make_item("<a@x>", 30),
        ]));
        let importer = Arc::new(ScriptedImporter::default());
        let store = Arc::new(InMemoryStateStore::new());
        let engine = make_engine(
            source,
            importer.clone(),
            store.clone(),
            SyncSettings::default(),
        );

        let result = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert_eq!(result.items_seen, 3);
        assert_eq!(result.items_imported, 3);
        assert_eq!(result.items_skipped_duplicate, 0);
        assert!(result.errors.is_empty());
        assert_eq!(importer.written(), vec!["<a@x>", "<b@x>", "<c@x>"]);
        assert_eq!(
            store.get_checkpoint(SyncMode::Fast).unwrap(),
            Some(result.window_end)
        );
    }

    #[test]
    fn test_repeat_pass_skips_recorded_items() {
        let source = Arc::new(ScriptedSource::new(vec![
            make_item("<a@x>", 30),
            make_item("<b@x>", 20),
        ]));
        let importer = Arc::new(ScriptedImporter::default());
        let store = Arc::new(InMemoryStateStore::new());
        let engine = make_engine(
            source,
            importer.clone(),
            store.clone(),
            SyncSettings::default(),
        );

        engine.run_sync_once(SyncMode::Fast).unwrap();
        let second = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert_eq!(second.items_imported, 0);
        assert_eq!(second.items_skipped_duplicate, 2);
        assert_eq!(importer.written().len(), 2);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_failed_item_blocks_checkpoint_until_retried() {
        let items = vec![
            make_item("<a@x>", 30),
            make_item("<b@x>", 20),
            make_item("<c@x>", 10),
        ];
        let store = Arc::new(InMemoryStateStore::new());

        let failing = Arc::new(ScriptedImporter::failing(&["<b@x>"]));
        let engine = make_engine(
            Arc::new(ScriptedSource::new(items.clone())),
            failing,
            store.clone(),
            SyncSettings::default(),
        );
        let first = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert_eq!(first.items_imported, 2);
        assert_eq!(first.errors.len(), 1);
        assert_eq!(first.errors[0].message_id, MessageId::new("<b@x>"));
        assert_eq!(store.get_checkpoint(SyncMode::Fast).unwrap(), None);

        // Retry with a healthy destination: only the failed item is written
        let healthy = Arc::new(ScriptedImporter::default());
        let engine = make_engine(
            Arc::new(ScriptedSource::new(items)),
            healthy.clone(),
            store.clone(),
            SyncSettings::default(),
        );
        let second = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert_eq!(second.items_imported, 1);
        assert_eq!(second.items_skipped_duplicate, 2);
        assert_eq!(healthy.written(), vec!["<b@x>"]);
        assert_eq!(
            store.get_checkpoint(SyncMode::Fast).unwrap(),
            Some(second.window_end)
        );
    }

    #[test]
    fn test_duplicate_destination_treated_as_imported() {
        let source = Arc::new(ScriptedSource::new(vec![make_item("<a@x>", 10)]));
        let importer = Arc::new(ScriptedImporter {
            duplicate_ids: ["<a@x>".to_string()].into_iter().collect(),
            ..ScriptedImporter::default()
        });
        let store = Arc::new(InMemoryStateStore::new());
        let engine = make_engine(source, importer, store.clone(), SyncSettings::default());

        let result = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert_eq!(result.items_imported, 1);
        assert!(result.errors.is_empty());

        let record = store
            .get_record(&MessageId::new("<a@x>"))
            .unwrap()
            .unwrap();
        assert_eq!(record.destination_id, DestinationId::new("existing-<a@x>"));
        assert_eq!(
            store.get_checkpoint(SyncMode::Fast).unwrap(),
            Some(result.window_end)
        );
    }

    #[test]
    fn test_items_outside_window_are_dropped() {
        let source = Arc::new(ScriptedSource::new(vec![
            // Inside the grace period, not yet eligible
            make_item("<new@x>", 1),
            make_item("<ok@x>", 10),
            // Older than the fast look-back
            make_item("<old@x>", 100),
        ]));
        let importer = Arc::new(ScriptedImporter::default());
        let store = Arc::new(InMemoryStateStore::new());
        let engine = make_engine(
            source,
            importer.clone(),
            store,
            SyncSettings::default(),
        );

        let result = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert_eq!(result.items_seen, 1);
        assert_eq!(result.items_imported, 1);
        assert_eq!(importer.written(), vec!["<ok@x>"]);
    }

    #[test]
    fn test_cap_truncates_pass_and_defers_checkpoint() {
        let items = vec![
            make_item("<a@x>", 30),
            make_item("<b@x>", 20),
            make_item("<c@x>", 10),
        ];
        let settings = SyncSettings {
            items_per_run: 2,
            ..SyncSettings::default()
        };
        let store = Arc::new(InMemoryStateStore::new());

        let importer = Arc::new(ScriptedImporter::default());
        let engine = make_engine(
            Arc::new(ScriptedSource::new(items.clone())),
            importer.clone(),
            store.clone(),
            settings.clone(),
        );
        let first = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert!(first.truncated);
        assert_eq!(first.items_imported, 2);
        assert_eq!(importer.written(), vec!["<a@x>", "<b@x>"]);
        assert_eq!(store.get_checkpoint(SyncMode::Fast).unwrap(), None);

        // The next pass picks up the remainder and completes the window
        let engine = make_engine(
            Arc::new(ScriptedSource::new(items)),
            Arc::new(ScriptedImporter::default()),
            store.clone(),
            settings,
        );
        let second = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert!(!second.truncated);
        assert_eq!(second.items_imported, 1);
        assert_eq!(second.items_skipped_duplicate, 2);
        assert!(store.get_checkpoint(SyncMode::Fast).unwrap().is_some());
    }

    #[test]
    fn test_prepare_failure_aborts_pass() {
        let source = Arc::new(ScriptedSource::new(vec![make_item("<a@x>", 10)]));
        let importer = Arc::new(ScriptedImporter {
            prepare_error: Some("token refresh rejected".to_string()),
            ..ScriptedImporter::default()
        });
        let store = Arc::new(InMemoryStateStore::new());
        let engine = make_engine(source, importer.clone(), store.clone(), SyncSettings::default());

        let err = engine.run_sync_once(SyncMode::Fast).unwrap_err();

        assert!(matches!(
            err,
            SyncError::Destination(ImportError::Auth(_))
        ));
        assert!(importer.written().is_empty());
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.get_checkpoint(SyncMode::Fast).unwrap(), None);
    }

    #[test]
    fn test_empty_window_skips_remote_calls() {
        let source = Arc::new(ScriptedSource::new(vec![make_item("<a@x>", 10)]));
        // A failing prepare proves the destination is never contacted
        let importer = Arc::new(ScriptedImporter {
            prepare_error: Some("unreachable".to_string()),
            ..ScriptedImporter::default()
        });
        let store = Arc::new(InMemoryStateStore::new());

        // Checkpoint ahead of now - grace makes the window empty
        let checkpoint: DateTime<Utc> = Utc::now() + Duration::minutes(10);
        store.set_checkpoint(SyncMode::Fast, checkpoint).unwrap();

        let engine = make_engine(
            source.clone(),
            importer,
            store.clone(),
            SyncSettings::default(),
        );
        let result = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert_eq!(source.fetch_count(), 0);
        assert_eq!(result.items_seen, 0);
        assert_eq!(result.items_imported, 0);
        assert!(result.errors.is_empty());
        assert_eq!(
            store.get_checkpoint(SyncMode::Fast).unwrap(),
            Some(checkpoint)
        );
    }

    #[test]
    fn test_first_run_empty_window_still_records_a_checkpoint() {
        let source = Arc::new(ScriptedSource::new(vec![make_item("<a@x>", 10)]));
        let importer = Arc::new(ScriptedImporter::default());
        let store = Arc::new(InMemoryStateStore::new());

        // Grace beyond the look-back leaves nothing eligible yet
        let settings = SyncSettings {
            fast_look_back_days: 1,
            grace_minutes: 2 * 24 * 60,
            ..SyncSettings::default()
        };
        let engine = make_engine(source.clone(), importer, store.clone(), settings);

        let before = Utc::now();
        let result = engine.run_sync_once(SyncMode::Fast).unwrap();

        assert_eq!(source.fetch_count(), 0);
        assert_eq!(result.items_seen, 0);
        assert!(result.is_clean());

        // The clean pass still floors the checkpoint at its window end
        let checkpoint = store.get_checkpoint(SyncMode::Fast).unwrap().unwrap();
        assert!(checkpoint >= before - Duration::minutes(2 * 24 * 60));
        assert!(checkpoint <= Utc::now() - Duration::minutes(2 * 24 * 60));
    }
}
