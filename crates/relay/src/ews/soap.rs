//! SOAP request construction and response parsing for EWS
//!
//! Requests are built as raw XML and responses are walked with a
//! streaming reader, matching on local element names so namespace
//! prefixes do not matter.

use base64::prelude::*;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::SourceError;
use crate::models::SyncWindow;

/// Page size for FindItem enumeration
pub const FIND_PAGE_SIZE: usize = 100;

/// One item reference returned by a FindItem page
#[derive(Debug, Clone)]
pub struct ItemRef {
    /// Server-assigned item id, used for the MIME fetch
    pub item_id: String,
    /// RFC 822 Message-ID header, when the server exposes one
    pub internet_message_id: Option<String>,
    pub subject: String,
    pub sender: String,
    /// Received (or sent) timestamp; items without one cannot be
    /// window-checked and are dropped by the caller
    pub timestamp: Option<DateTime<Utc>>,
}

/// One page of FindItem results
#[derive(Debug)]
pub struct FindItemPage {
    pub items: Vec<ItemRef>,
    /// False while more pages remain in the view
    pub includes_last_item: bool,
}

/// Format a timestamp the way EWS restrictions expect it
pub fn format_ews_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build a FindItem request for one page of a folder.
///
/// `date_field` selects the timestamp the window restriction and the
/// sort order apply to (received for the inbox, sent for sent items).
pub fn find_item_request(
    folder_id: &str,
    date_field: &str,
    window: &SyncWindow,
    offset: usize,
) -> String {
    let start = format_ews_datetime(window.start);
    let end = format_ews_datetime(window.end);
    let page_size = FIND_PAGE_SIZE;

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"
               xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types"
               xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages">
  <soap:Header>
    <t:RequestServerVersion Version="Exchange2010_SP2"/>
  </soap:Header>
  <soap:Body>
    <m:FindItem Traversal="Shallow">
      <m:ItemShape>
        <t:BaseShape>IdOnly</t:BaseShape>
        <t:AdditionalProperties>
          <t:FieldURI FieldURI="item:Subject"/>
          <t:FieldURI FieldURI="{date_field}"/>
          <t:FieldURI FieldURI="message:InternetMessageId"/>
          <t:FieldURI FieldURI="message:From"/>
        </t:AdditionalProperties>
      </m:ItemShape>
      <m:IndexedPageItemView MaxEntriesReturned="{page_size}" Offset="{offset}" BasePoint="Beginning"/>
      <m:Restriction>
        <t:And>
          <t:IsGreaterThanOrEqualTo>
            <t:FieldURI FieldURI="{date_field}"/>
            <t:FieldURIOrConstant>
              <t:Constant Value="{start}"/>
            </t:FieldURIOrConstant>
          </t:IsGreaterThanOrEqualTo>
          <t:IsLessThan>
            <t:FieldURI FieldURI="{date_field}"/>
            <t:FieldURIOrConstant>
              <t:Constant Value="{end}"/>
            </t:FieldURIOrConstant>
          </t:IsLessThan>
        </t:And>
      </m:Restriction>
      <m:SortOrder>
        <t:FieldOrder Order="Ascending">
          <t:FieldURI FieldURI="{date_field}"/>
        </t:FieldOrder>
      </m:SortOrder>
      <m:ParentFolderIds>
        <t:DistinguishedFolderId Id="{folder_id}"/>
      </m:ParentFolderIds>
    </m:FindItem>
  </soap:Body>
</soap:Envelope>"#
    )
}

/// Build a GetItem request fetching full MIME content for a batch of ids
pub fn get_item_request(item_ids: &[String]) -> String {
    let ids = item_ids
        .iter()
        .map(|id| format!(r#"        <t:ItemId Id="{}"/>"#, xml_escape(id)))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"
               xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types"
               xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages">
  <soap:Header>
    <t:RequestServerVersion Version="Exchange2010_SP2"/>
  </soap:Header>
  <soap:Body>
    <m:GetItem>
      <m:ItemShape>
        <t:BaseShape>IdOnly</t:BaseShape>
        <t:IncludeMimeContent>true</t:IncludeMimeContent>
      </m:ItemShape>
      <m:ItemIds>
{ids}
      </m:ItemIds>
    </m:GetItem>
  </soap:Body>
</soap:Envelope>"#
    )
}

/// Parse one FindItem response page
pub fn parse_find_item_response(xml: &str) -> Result<FindItemPage, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items: Vec<ItemRef> = Vec::new();
    let mut includes_last_item = true;
    let mut current: Option<ItemRef> = None;
    let mut response_error = false;
    let mut error_text: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.contains("ResponseMessage") && !name.ends_with("ResponseMessages") {
                    if attribute_value(&e, "ResponseClass").as_deref() == Some("Error") {
                        response_error = true;
                    }
                } else if name.contains("RootFolder") {
                    if let Some(v) = attribute_value(&e, "IncludesLastItemInRange") {
                        includes_last_item = v == "true";
                    }
                } else if name.contains("ItemId") {
                    start_item(&e, &mut current, &mut items);
                } else if response_error && name.contains("MessageText") {
                    if let Ok(Event::Text(t)) = reader.read_event() {
                        error_text = Some(t.unescape().unwrap_or_default().to_string());
                    }
                } else if name.contains("InternetMessageId") {
                    if let (Some(item), Ok(Event::Text(t))) = (current.as_mut(), reader.read_event())
                    {
                        item.internet_message_id =
                            Some(t.unescape().unwrap_or_default().to_string());
                    }
                } else if name.contains("Subject") {
                    if let (Some(item), Ok(Event::Text(t))) = (current.as_mut(), reader.read_event())
                    {
                        item.subject = t.unescape().unwrap_or_default().to_string();
                    }
                } else if name.contains("EmailAddress") {
                    if let (Some(item), Ok(Event::Text(t))) = (current.as_mut(), reader.read_event())
                    {
                        if item.sender.is_empty() {
                            item.sender = t.unescape().unwrap_or_default().to_string();
                        }
                    }
                } else if name.contains("DateTimeReceived") || name.contains("DateTimeSent") {
                    if let (Some(item), Ok(Event::Text(t))) = (current.as_mut(), reader.read_event())
                    {
                        let raw = t.unescape().unwrap_or_default();
                        item.timestamp = DateTime::parse_from_rfc3339(raw.as_ref())
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc));
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.contains("ItemId") {
                    start_item(&e, &mut current, &mut items);
                } else if name.contains("RootFolder") {
                    if let Some(v) = attribute_value(&e, "IncludesLastItemInRange") {
                        includes_last_item = v == "true";
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.contains("RootFolder")
                    && let Some(prev) = current.take()
                {
                    items.push(prev);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::Transient(format!(
                    "failed to parse FindItem response: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    if response_error {
        return Err(SourceError::Transient(format!(
            "EWS FindItem failed: {}",
            error_text.unwrap_or_else(|| "unknown error".to_string())
        )));
    }

    Ok(FindItemPage {
        items,
        includes_last_item,
    })
}

/// Parse a GetItem response into (item id, decoded MIME) pairs.
///
/// Any item-level error in the response fails the whole call; the caller
/// retries the window on a later pass rather than losing items.
pub fn parse_get_item_response(xml: &str) -> Result<Vec<(String, Vec<u8>)>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pairs: Vec<(String, Vec<u8>)> = Vec::new();
    let mut current_mime: Option<Vec<u8>> = None;
    let mut failed = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.contains("ResponseMessage") && !name.ends_with("ResponseMessages") {
                    if attribute_value(&e, "ResponseClass").as_deref() == Some("Error") {
                        failed += 1;
                    }
                } else if name.contains("MimeContent") {
                    if let Ok(Event::Text(t)) = reader.read_event() {
                        // The payload may be wrapped across lines
                        let encoded: String =
                            t.unescape().unwrap_or_default().split_whitespace().collect();
                        match BASE64_STANDARD.decode(encoded.as_bytes()) {
                            Ok(bytes) => current_mime = Some(bytes),
                            Err(e) => {
                                return Err(SourceError::Transient(format!(
                                    "invalid MIME content encoding: {}",
                                    e
                                )));
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                // ItemId trails MimeContent within each returned item
                if name.contains("ItemId")
                    && let Some(mime) = current_mime.take()
                    && let Some(id) = attribute_value(&e, "Id")
                {
                    pairs.push((id, mime));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::Transient(format!(
                    "failed to parse GetItem response: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    if failed > 0 {
        return Err(SourceError::Transient(format!(
            "EWS GetItem reported {} failed item(s)",
            failed
        )));
    }

    Ok(pairs)
}

/// Close out the current item (if any) and open a new one from an ItemId
fn start_item(e: &BytesStart, current: &mut Option<ItemRef>, items: &mut Vec<ItemRef>) {
    if let Some(prev) = current.take() {
        items.push(prev);
    }
    if let Some(id) = attribute_value(e, "Id") {
        *current = Some(ItemRef {
            item_id: id,
            internet_message_id: None,
            subject: String::new(),
            sender: String::new(),
            timestamp: None,
        });
    }
}

fn attribute_value(e: &BytesStart, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == name.as_bytes())
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
