//! EWS HTTP client and the source reader built on it
//!
//! Uses synchronous HTTP (ureq) to stay executor-agnostic.

use anyhow::{Context, Result};
use base64::prelude::*;
use log::{debug, warn};
use std::collections::HashMap;
use url::Url;

use super::soap;
use crate::config::ExchangeCredentials;
use crate::engine::SourceReader;
use crate::error::SourceError;
use crate::models::{MessageId, SourceFolder, SourceItem, SyncWindow};

/// Items per GetItem MIME batch
const MIME_BATCH_SIZE: usize = 10;

/// Response body cap; MIME batches can carry large attachments
const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

/// Client for one Exchange mailbox over EWS
pub struct EwsClient {
    endpoint: String,
    auth_header: String,
}

impl EwsClient {
    /// Create a client from credentials, validating the endpoint URL
    pub fn new(credentials: &ExchangeCredentials) -> Result<Self> {
        let endpoint = format!("https://{}/EWS/Exchange.asmx", credentials.server);
        Url::parse(&endpoint)
            .with_context(|| format!("Invalid EWS server {:?}", credentials.server))?;

        let token = BASE64_STANDARD.encode(format!(
            "{}:{}",
            credentials.username, credentials.password
        ));

        Ok(Self {
            endpoint,
            auth_header: format!("Basic {}", token),
        })
    }

    /// POST one SOAP envelope and return the response body
    fn send(&self, body: &str) -> Result<String, SourceError> {
        let response = ureq::post(&self.endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("Authorization", &self.auth_header)
            .send(body);

        match response {
            Ok(mut res) => res
                .body_mut()
                .with_config()
                .limit(MAX_RESPONSE_BYTES)
                .read_to_string()
                .map_err(|e| {
                    SourceError::Transient(format!("failed to read EWS response: {}", e))
                }),
            Err(ureq::Error::StatusCode(code)) if code == 401 || code == 403 => Err(
                SourceError::Auth(format!("EWS rejected credentials (HTTP {})", code)),
            ),
            Err(e) => Err(SourceError::Transient(e.to_string())),
        }
    }

    /// Enumerate all item refs in the window for one folder
    fn find_items(
        &self,
        folder: SourceFolder,
        window: &SyncWindow,
    ) -> Result<Vec<soap::ItemRef>, SourceError> {
        let folder_id = ews_folder_id(folder);
        let date_field = ews_date_field(folder);
        let mut refs = Vec::new();
        let mut offset = 0;

        loop {
            let request = soap::find_item_request(folder_id, date_field, window, offset);
            let response = self.send(&request)?;
            let page = soap::parse_find_item_response(&response)?;

            let fetched = page.items.len();
            refs.extend(page.items);

            if page.includes_last_item || fetched == 0 {
                break;
            }
            offset += fetched;
        }

        debug!("Found {} items in {}", refs.len(), folder.as_str());
        Ok(refs)
    }

    /// Fetch MIME content for the refs, keyed by item id
    fn fetch_mime(&self, refs: &[soap::ItemRef]) -> Result<HashMap<String, Vec<u8>>, SourceError> {
        let mut contents = HashMap::new();

        for batch in refs.chunks(MIME_BATCH_SIZE) {
            let ids: Vec<String> = batch.iter().map(|r| r.item_id.clone()).collect();
            let request = soap::get_item_request(&ids);
            let response = self.send(&request)?;
            for (id, mime) in soap::parse_get_item_response(&response)? {
                contents.insert(id, mime);
            }
        }

        Ok(contents)
    }
}

impl SourceReader for EwsClient {
    fn fetch(&self, window: &SyncWindow) -> Result<Vec<SourceItem>, SourceError> {
        let mut items = Vec::new();

        for folder in SourceFolder::ALL {
            let refs = self.find_items(folder, window)?;
            if refs.is_empty() {
                continue;
            }

            let mut contents = self.fetch_mime(&refs)?;

            for item_ref in refs {
                let Some(timestamp) = item_ref.timestamp else {
                    warn!("Dropping {} without a timestamp", item_ref.item_id);
                    continue;
                };
                let Some(mime) = contents.remove(&item_ref.item_id) else {
                    // A missing payload fails the pass so the item is
                    // retried instead of silently skipped past
                    return Err(SourceError::Transient(format!(
                        "EWS returned no MIME content for {}",
                        item_ref.item_id
                    )));
                };

                let id = match item_ref.internet_message_id {
                    Some(message_id) => MessageId::new(message_id),
                    None => MessageId::new(item_ref.item_id),
                };

                items.push(
                    SourceItem::new(id, folder, timestamp)
                        .with_subject(item_ref.subject)
                        .with_sender(item_ref.sender)
                        .with_mime(mime),
                );
            }
        }

        Ok(items)
    }
}

fn ews_folder_id(folder: SourceFolder) -> &'static str {
    match folder {
        SourceFolder::Inbox => "inbox",
        SourceFolder::Sent => "sentitems",
    }
}

/// Sent items are windowed on their sent time, everything else on receipt
fn ews_date_field(folder: SourceFolder) -> &'static str {
    match folder {
        SourceFolder::Inbox => "item:DateTimeReceived",
        SourceFolder::Sent => "item:DateTimeSent",
    }
}
