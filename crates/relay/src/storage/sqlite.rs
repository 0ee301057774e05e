//! SQLite-based sync state storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{CheckpointStore, DedupLedger};
use crate::error::StorageError;
use crate::models::{DedupRecord, DestinationId, MessageId, SyncMode};
use chrono::{DateTime, Utc};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- One row per imported source identity, never updated
            CREATE TABLE dedup_records (
                message_id TEXT PRIMARY KEY,
                destination_id TEXT NOT NULL,
                imported_at TEXT NOT NULL
            );

            -- High-water mark per sync mode
            CREATE TABLE checkpoints (
                mode TEXT PRIMARY KEY,
                window_end TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        ),
    ])
}

/// SQLite-backed dedup ledger and checkpoint store.
///
/// One small database file holds both regions of durable state; the dedup
/// table grows with every imported item and is pruned only by external
/// retention policy.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the state database at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        // WAL keeps concurrent readers cheap while a pass is writing;
        // synchronous = NORMAL is safe under WAL and avoids an fsync per
        // statement.
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_stored_datetime(s: &str, what: &str) -> Result<DateTime<Utc>, StorageError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StorageError::new(format!("corrupt {} timestamp {:?}: {}", what, s, e)))
}

impl DedupLedger for SqliteStateStore {
    fn contains(&self, id: &MessageId) -> Result<bool, StorageError> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dedup_records WHERE message_id = ?",
            [id.as_str()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn record(&self, record: DedupRecord) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();

        // First write wins; re-recording an identity is a no-op
        conn.execute(
            "INSERT INTO dedup_records (message_id, destination_id, imported_at)
             VALUES (?, ?, ?)
             ON CONFLICT(message_id) DO NOTHING",
            params![
                record.message_id.as_str(),
                record.destination_id.as_str(),
                record.imported_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn get_record(&self, id: &MessageId) -> Result<Option<DedupRecord>, StorageError> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                "SELECT message_id, destination_id, imported_at
                 FROM dedup_records WHERE message_id = ?",
                [id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((message_id, destination_id, imported_at_str)) = row else {
            return Ok(None);
        };

        let imported_at = parse_stored_datetime(&imported_at_str, "dedup record")?;

        Ok(Some(DedupRecord {
            message_id: MessageId::new(message_id),
            destination_id: DestinationId::new(destination_id),
            imported_at,
        }))
    }

    fn count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().unwrap();

        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM dedup_records", [], |row| row.get(0))?;

        Ok(count as usize)
    }
}

impl CheckpointStore for SqliteStateStore {
    fn get_checkpoint(&self, mode: SyncMode) -> Result<Option<DateTime<Utc>>, StorageError> {
        let conn = self.conn.lock().unwrap();

        let window_end: Option<String> = conn
            .query_row(
                "SELECT window_end FROM checkpoints WHERE mode = ?",
                [mode.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(window_end) = window_end else {
            return Ok(None);
        };

        Ok(Some(parse_stored_datetime(&window_end, "checkpoint")?))
    }

    fn set_checkpoint(&self, mode: SyncMode, at: DateTime<Utc>) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT OR REPLACE INTO checkpoints (mode, window_end, updated_at)
             VALUES (?, ?, ?)",
            params![
                mode.as_str(),
                at.to_rfc3339(),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }
}
