//! Source item model: one mailbox item as fetched from the source system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a source item.
///
/// The RFC 822 Message-ID header when the item carries one, otherwise the
/// source system's own item id. This is the dedup ledger key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier assigned by the destination mailbox on import
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestinationId(pub String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DestinationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DestinationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source folder an item was read from.
///
/// Determines where the item lands in the destination (inbox vs the
/// sent-mail label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFolder {
    Inbox,
    Sent,
}

impl SourceFolder {
    /// Both folders covered by a sync pass
    pub const ALL: [SourceFolder; 2] = [SourceFolder::Inbox, SourceFolder::Sent];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFolder::Inbox => "inbox",
            SourceFolder::Sent => "sent",
        }
    }
}

/// One mailbox item fetched from the source system.
///
/// Immutable once fetched. The MIME payload is opaque to the engine; only
/// the identity and timestamp drive sync decisions.
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Dedup identity (RFC 822 Message-ID or source item id)
    pub id: MessageId,
    /// Folder the item was read from
    pub folder: SourceFolder,
    /// Subject line, for logs only
    pub subject: String,
    /// Sender, for logs only
    pub sender: String,
    /// Source-side timestamp (received for inbox, sent for sent items)
    pub received_at: DateTime<Utc>,
    /// Full raw MIME content
    pub mime: Vec<u8>,
}

impl SourceItem {
    pub fn new(id: MessageId, folder: SourceFolder, received_at: DateTime<Utc>) -> Self {
        Self {
            id,
            folder,
            subject: String::new(),
            sender: String::new(),
            received_at,
            mime: Vec::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_mime(mut self, mime: Vec<u8>) -> Self {
        self.mime = mime;
        self
    }

    /// The RFC 822 Message-ID, when the identity is one.
    ///
    /// Items that fell back to a source item id return None; destination
    /// duplicate probes are skipped for those.
    pub fn rfc822_id(&self) -> Option<&str> {
        let id = self.id.as_str();
        if id.starts_with('<') && id.ends_with('>') {
            Some(id)
        } else {
            None
        }
    }
}
