//! Relay crate - one-way mailbox relay engine and its adapters
//!
//! This crate provides platform-independent relay functionality including:
//! - Domain models (SourceItem, SyncWindow, SyncResult)
//! - The sync engine: bounded, idempotent, stateless-per-pass
//! - EWS source reader and Gmail importer adapters
//! - State storage traits with SQLite and in-memory backends
//!
//! This crate has no HTTP-server dependencies; the daemon wires these
//! pieces to its trigger endpoints.

pub mod config;
pub mod engine;
pub mod error;
pub mod ews;
pub mod gmail;
pub mod models;
pub mod storage;

pub use config::{ExchangeCredentials, SyncSettings};
pub use engine::{Importer, SourceReader, SyncEngine, compute_window, next_checkpoint};
pub use error::{ImportError, SourceError, StorageError, SyncError};
pub use ews::EwsClient;
pub use gmail::{AuthorizedUser, GmailAuth, GmailImporter};
pub use models::{
    DedupRecord, DestinationId, ItemError, MessageId, SourceFolder, SourceItem, SyncMode,
    SyncResult, SyncWindow,
};
pub use storage::{CheckpointStore, DedupLedger, InMemoryStateStore, SqliteStateStore, StateStore};
