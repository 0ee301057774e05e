//! Error taxonomy for sync passes
//!
//! Failures are split by scope: `SourceError` and `ImportError` belong to
//! the adapter that raised them, `StorageError` to the state store, and
//! `SyncError` to a whole pass. Item-level failures (imports, storage
//! writes) are collected into the pass result rather than propagated; only
//! pass-level failures abort a run.

use crate::models::DestinationId;

/// Durable state store failure (dedup ledger or checkpoint store)
#[derive(Debug, thiserror::Error)]
#[error("state store failure: {message}")]
pub struct StorageError {
    pub message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Failure while reading items from the source mailbox.
///
/// Both variants abort the whole pass; `Auth` additionally signals that the
/// credentials need outside attention rather than a plain retry.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source mailbox unreachable: {0}")]
    Transient(String),
    #[error("source rejected credentials: {0}")]
    Auth(String),
}

/// Failure while writing one item to the destination mailbox.
///
/// `Duplicate` is not a real failure: the destination already holds the
/// message, and the engine records the existing identity and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("destination unreachable: {0}")]
    Transient(String),
    #[error("destination rejected credentials: {0}")]
    Auth(String),
    #[error("destination already holds this message as {existing}")]
    Duplicate { existing: DestinationId },
}

/// A failure that aborts an entire sync pass.
///
/// The checkpoint is left unchanged in every case; the next scheduled
/// invocation re-runs the window and dedup keeps the retry idempotent.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("missing or invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("destination not ready: {0}")]
    Destination(ImportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
