//! Minimal Telegram Bot API client

use log::debug;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Telegram Bot API failure.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram transport error: {0}")]
    Transport(String),
    #[error("telegram api error: {0}")]
    Api(String),
}

/// Response envelope common to all Bot API methods.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    result: Option<Value>,
}

/// Client bound to one bot token.
pub struct TelegramClient {
    base_url: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Self {
        Self {
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
        }
    }

    /// Call one Bot API method with a JSON payload.
    fn call(&self, method: &str, payload: &Value) -> Result<Value, TelegramError> {
        debug!("Calling Telegram method {}", method);
        let url = format!("{}/{}", self.base_url, method);

        let mut response = match ureq::post(&url).send_json(payload) {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => {
                return Err(TelegramError::Api(format!("{method} returned HTTP {code}")));
            }
            Err(e) => return Err(TelegramError::Transport(e.to_string())),
        };

        let parsed: ApiResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| TelegramError::Transport(format!("invalid response for {method}: {e}")))?;

        if !parsed.ok {
            let description = parsed
                .description
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(TelegramError::Api(format!("{method} failed: {description}")));
        }

        Ok(parsed.result.unwrap_or(Value::Null))
    }

    /// Send an HTML-formatted message, returning its message id.
    pub fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<i64, TelegramError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = reply_markup {
            payload["reply_markup"] = markup;
        }

        let result = self.call("sendMessage", &payload)?;
        result
            .get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| TelegramError::Api("sendMessage result missing message_id".to_string()))
    }

    /// Pin a message without notifying the chat. Needs admin rights in
    /// group chats.
    pub fn pin_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        let payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "disable_notification": true,
        });
        self.call("pinChatMessage", &payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_embeds_token() {
        let client = TelegramClient::new("123:abc");
        assert_eq!(client.base_url, "https://api.telegram.org/bot123:abc");
    }

    #[test]
    fn test_api_response_parses_error_shape() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"ok": false, "description": "Forbidden: bot was blocked"}"#)
                .unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Forbidden: bot was blocked"));
        assert!(parsed.result.is_none());
    }

    #[test]
    fn test_api_response_parses_message_result() {
        let parsed: ApiResponse = serde_json::from_str(
            r#"{"ok": true, "result": {"message_id": 42, "chat": {"id": 7}}}"#,
        )
        .unwrap();
        assert!(parsed.ok);
        let message_id = parsed.result.unwrap()["message_id"].as_i64();
        assert_eq!(message_id, Some(42));
    }
}
