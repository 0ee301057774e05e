//! Gmail destination
//!
//! This module provides:
//! - OAuth2 refresh-token management for a headless service
//! - The importer client writing raw MIME via the Gmail import endpoint

mod auth;
mod client;

pub use auth::{AuthorizedUser, GmailAuth};
pub use client::GmailImporter;

/// Gmail API request and response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Request body for importing a raw RFC 822 message
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImportMessageRequest {
        /// Base64url-encoded MIME payload
        pub raw: String,
        pub label_ids: Vec<String>,
    }

    /// Response from a message import
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImportMessageResponse {
        pub id: String,
    }

    /// Request body for modifying a message's labels
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ModifyMessageRequest {
        pub add_label_ids: Vec<String>,
    }

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
    }

    /// Reference to a message (just the ID)
    #[derive(Debug, Deserialize)]
    pub struct MessageRef {
        pub id: String,
    }

    /// One mailbox label
    #[derive(Debug, Deserialize)]
    pub struct Label {
        pub id: String,
        pub name: String,
    }

    /// Response from listing labels
    #[derive(Debug, Deserialize)]
    pub struct ListLabelsResponse {
        pub labels: Option<Vec<Label>>,
    }

    /// Request body for creating a label
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateLabelRequest {
        pub name: String,
        pub label_list_visibility: String,
        pub message_list_visibility: String,
    }
}
