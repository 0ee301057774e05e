//! Gmail OAuth2 token management
//!
//! A headless service cannot run the interactive consent flow, so the
//! refresh token is provisioned out of band and only the refresh grant
//! is exercised here. Uses synchronous HTTP (ureq) to be
//! executor-agnostic.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::sync::Mutex;

use crate::error::ImportError;

/// Token file name in the relay config directory
const TOKEN_FILE: &str = "gmail-token.json";

/// Authorized-user secrets, as issued by Google's consent tooling.
///
/// Unknown fields in the JSON (token_uri, type, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl AuthorizedUser {
    /// Load secrets using the following priority:
    /// 1. GMAIL_TOKEN_JSON environment variable (inline JSON)
    /// 2. JSON file (~/.config/relay/gmail-token.json)
    pub fn load() -> Result<Self> {
        if let Ok(raw) = std::env::var("GMAIL_TOKEN_JSON")
            && !raw.is_empty()
        {
            return Self::from_json(&raw);
        }

        if config::config_exists(TOKEN_FILE) {
            return config::load_json(TOKEN_FILE);
        }

        anyhow::bail!(
            "GMAIL_TOKEN_JSON not set and no {} in the config directory",
            TOKEN_FILE
        )
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Invalid Gmail token JSON")
    }

    /// Check if secrets are available (env var or config file)
    pub fn is_available() -> bool {
        std::env::var("GMAIL_TOKEN_JSON")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
            || config::config_exists(TOKEN_FILE)
    }
}

/// Cached access token with its expiry (unix seconds)
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Token response from Google
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

/// Refreshing token source for Gmail API calls
pub struct GmailAuth {
    user: AuthorizedUser,
    cached: Mutex<Option<CachedToken>>,
}

impl GmailAuth {
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";

    pub fn new(user: AuthorizedUser) -> Self {
        Self {
            user,
            cached: Mutex::new(None),
        }
    }

    /// Get a valid access token, refreshing when the cached one is
    /// missing or within 5 minutes of expiry
    pub fn access_token(&self) -> Result<String, ImportError> {
        let mut cached = self.cached.lock().unwrap();

        if let Some(token) = cached.as_ref() {
            let now = chrono::Utc::now().timestamp();
            if token.expires_at > now + 300 {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Refreshing Gmail access token");
        let token = self.refresh_access_token()?;
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: chrono::Utc::now().timestamp() + token.expires_in.unwrap_or(3600) as i64,
        });

        Ok(access_token)
    }

    /// Exchange the refresh token for a fresh access token.
    ///
    /// A 4xx here means Google rejected the grant (revoked or expired
    /// consent) and re-provisioning is needed; anything else is assumed
    /// to pass on a later attempt.
    fn refresh_access_token(&self) -> Result<TokenResponse, ImportError> {
        let response = ureq::post(Self::TOKEN_URL).send_form([
            ("client_id", self.user.client_id.as_str()),
            ("client_secret", self.user.client_secret.as_str()),
            ("refresh_token", self.user.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ]);

        match response {
            Ok(res) => res.into_body().read_json().map_err(|e| {
                ImportError::Transient(format!("failed to parse token response: {}", e))
            }),
            Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Err(
                ImportError::Auth(format!("Gmail token refresh rejected (HTTP {})", code)),
            ),
            Err(e) => Err(ImportError::Transient(e.to_string())),
        }
    }
}
