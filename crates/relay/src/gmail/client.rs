//! Gmail importer client
//!
//! Writes source items into the destination mailbox with the import
//! endpoint, keeping original dates by trusting the Date header.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use base64::prelude::*;
use log::{debug, info, warn};
use std::sync::Mutex;

use super::GmailAuth;
use super::api::{
    CreateLabelRequest, ImportMessageRequest, ImportMessageResponse, Label, ListLabelsResponse,
    ListMessagesResponse, ModifyMessageRequest,
};
use crate::engine::Importer;
use crate::error::ImportError;
use crate::models::{DestinationId, SourceFolder, SourceItem};

/// Label names used on imported mail
mod labels {
    pub const INBOX: &str = "INBOX";
    pub const UNREAD: &str = "UNREAD";
    /// System label used when the mirror label cannot be created
    pub const SENT_FALLBACK: &str = "SENT";
    /// User label that mirrors the source's sent folder
    pub const SENT_MIRROR: &str = "Exchange/Sent";
}

/// Importer writing items into a Gmail mailbox
pub struct GmailImporter {
    auth: GmailAuth,
    /// Label id for sent items, resolved by prepare() each pass
    sent_label_id: Mutex<Option<String>>,
}

impl GmailImporter {
    /// Gmail API base URL (me = the authorized user)
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1/users/me";

    /// Create a new importer
    pub fn new(auth: GmailAuth) -> Self {
        Self {
            auth,
            sent_label_id: Mutex::new(None),
        }
    }

    /// Find an existing copy of a message by its RFC 822 Message-ID
    fn find_by_rfc822_id(
        &self,
        access_token: &str,
        rfc822_id: &str,
    ) -> Result<Option<DestinationId>, ImportError> {
        let query = format!("rfc822msgid:\"{}\"", rfc822_id);
        let url = format!(
            "{}/messages?q={}&maxResults=1",
            Self::BASE_URL,
            urlencoding::encode(&query)
        );

        let response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call();

        let mut res = check_response(response)?;
        let list: ListMessagesResponse = res.body_mut().read_json().map_err(|e| {
            ImportError::Transient(format!("failed to parse search response: {}", e))
        })?;

        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|m| DestinationId::new(m.id)))
    }

    /// Resolve the label id that sent-folder mail lands under.
    ///
    /// The mirror label is created on first use; when creation fails the
    /// system SENT label stands in so imports keep flowing.
    fn resolve_sent_label(&self, access_token: &str) -> Result<String, ImportError> {
        if let Some(id) = self.find_label(access_token, labels::SENT_MIRROR)? {
            return Ok(id);
        }

        info!("Creating Gmail label {:?}", labels::SENT_MIRROR);
        match self.create_label(access_token, labels::SENT_MIRROR) {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!(
                    "Could not create label {:?} ({}), using {} instead",
                    labels::SENT_MIRROR,
                    e,
                    labels::SENT_FALLBACK
                );
                Ok(labels::SENT_FALLBACK.to_string())
            }
        }
    }

    fn find_label(&self, access_token: &str, name: &str) -> Result<Option<String>, ImportError> {
        let url = format!("{}/labels", Self::BASE_URL);
        let response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call();

        let mut res = check_response(response)?;
        let list: ListLabelsResponse = res.body_mut().read_json().map_err(|e| {
            ImportError::Transient(format!("failed to parse labels response: {}", e))
        })?;

        Ok(list
            .labels
            .unwrap_or_default()
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| l.id))
    }

    fn create_label(&self, access_token: &str, name: &str) -> Result<String, ImportError> {
        let url = format!("{}/labels", Self::BASE_URL);
        let request = CreateLabelRequest {
            name: name.to_string(),
            label_list_visibility: "labelShow".to_string(),
            message_list_visibility: "show".to_string(),
        };

        let response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&request);

        let mut res = check_response(response)?;
        let label: Label = res.body_mut().read_json().map_err(|e| {
            ImportError::Transient(format!("failed to parse create label response: {}", e))
        })?;
        Ok(label.id)
    }

    /// Labels a new import starts with, based on its source folder
    fn labels_for(&self, folder: SourceFolder) -> Vec<String> {
        match folder {
            SourceFolder::Inbox => vec![labels::INBOX.to_string()],
            SourceFolder::Sent => {
                let cached = self.sent_label_id.lock().unwrap();
                vec![
                    cached
                        .clone()
                        .unwrap_or_else(|| labels::SENT_FALLBACK.to_string()),
                ]
            }
        }
    }

    fn mark_unread(&self, access_token: &str, message_id: &str) -> Result<(), ImportError> {
        let url = format!("{}/messages/{}/modify", Self::BASE_URL, message_id);
        let request = ModifyMessageRequest {
            add_label_ids: vec![labels::UNREAD.to_string()],
        };

        let response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&request);

        check_response(response)?;
        Ok(())
    }
}

impl Importer for GmailImporter {
    fn prepare(&self) -> Result<(), ImportError> {
        let access_token = self.auth.access_token()?;
        let sent_label = self.resolve_sent_label(&access_token)?;
        *self.sent_label_id.lock().unwrap() = Some(sent_label);
        Ok(())
    }

    fn write(&self, item: &SourceItem) -> Result<DestinationId, ImportError> {
        let access_token = self.auth.access_token()?;

        // Probe by Message-ID first. The probe and the import are not
        // atomic, but the ledger keeps re-imports out on the common path.
        if let Some(rfc822_id) = item.rfc822_id()
            && let Some(existing) = self.find_by_rfc822_id(&access_token, rfc822_id)?
        {
            return Err(ImportError::Duplicate { existing });
        }

        let request = ImportMessageRequest {
            raw: BASE64_URL_SAFE.encode(&item.mime),
            label_ids: self.labels_for(item.folder),
        };

        let url = format!(
            "{}/messages/import?internalDateSource=dateHeader",
            Self::BASE_URL
        );
        let response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .send_json(&request);

        let mut res = check_response(response)?;
        let imported: ImportMessageResponse = res.body_mut().read_json().map_err(|e| {
            ImportError::Transient(format!("failed to parse import response: {}", e))
        })?;

        // Relayed mail should surface as unread; losing the label is not
        // worth failing the import over
        if let Err(e) = self.mark_unread(&access_token, &imported.id) {
            warn!("Could not mark {} unread: {}", imported.id, e);
        }

        debug!("Imported {} as {}", item.id.as_str(), imported.id);
        Ok(DestinationId::new(imported.id))
    }
}

/// Map a transport result, classifying HTTP status failures
fn check_response<T>(response: Result<T, ureq::Error>) -> Result<T, ImportError> {
    match response {
        Ok(res) => Ok(res),
        Err(ureq::Error::StatusCode(code)) if code == 401 || code == 403 => Err(
            ImportError::Auth(format!("Gmail rejected the request (HTTP {})", code)),
        ),
        Err(ureq::Error::StatusCode(code)) => Err(ImportError::Transient(format!(
            "Gmail request failed (HTTP {})",
            code
        ))),
        Err(e) => Err(ImportError::Transient(e.to_string())),
    }
}
