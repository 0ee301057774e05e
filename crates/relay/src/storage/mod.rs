//! Storage traits and implementations
//!
//! This module defines the durable state layer behind the sync engine: the
//! dedup ledger and the per-mode checkpoint store. The trait-based design
//! allows swapping between the SQLite store and an in-memory one.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStateStore;
pub use sqlite::SqliteStateStore;
pub use traits::{CheckpointStore, DedupLedger, StateStore};
