//! Domain models for the sync engine

pub mod item;
pub mod record;
pub mod result;
pub mod window;

pub use item::{DestinationId, MessageId, SourceFolder, SourceItem};
pub use record::DedupRecord;
pub use result::{ItemError, SyncResult};
pub use window::{SyncMode, SyncWindow};
