//! Configuration loading for the relay service
//!
//! Credentials and tunables come from the environment first (the service
//! deployment path), with JSON files in the relay config directory as the
//! local-development fallback.

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;

use crate::models::SyncMode;

/// Exchange credentials filename in the relay config directory
const EXCHANGE_CREDENTIALS_FILE: &str = "exchange-credentials.json";

/// Credentials and endpoint for the source Exchange mailbox
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeCredentials {
    /// Primary SMTP address of the mailbox
    pub email: String,
    /// Account username (DOMAIN\user or UPN form)
    pub username: String,
    pub password: String,
    /// EWS host, e.g. "mail.example.com"
    pub server: String,
}

impl ExchangeCredentials {
    /// Load credentials using the following priority:
    /// 1. Runtime environment variables
    /// 2. JSON file (~/.config/relay/exchange-credentials.json)
    pub fn load() -> Result<Self> {
        if let Ok(creds) = Self::from_env() {
            return Ok(creds);
        }

        if config::config_exists(EXCHANGE_CREDENTIALS_FILE) {
            return config::load_json(EXCHANGE_CREDENTIALS_FILE);
        }

        Self::from_env()
    }

    /// Load credentials from environment variables
    pub fn from_env() -> Result<Self> {
        let email = std::env::var("EXCHANGE_EMAIL")
            .context("EXCHANGE_EMAIL environment variable not set")?;
        let username = std::env::var("EXCHANGE_USERNAME")
            .context("EXCHANGE_USERNAME environment variable not set")?;
        let password = std::env::var("EXCHANGE_PASSWORD")
            .context("EXCHANGE_PASSWORD environment variable not set")?;
        let server =
            std::env::var("EWS_SERVER").context("EWS_SERVER environment variable not set")?;

        Ok(Self {
            email,
            username,
            password,
            server,
        })
    }

    /// Check if credentials are available (env vars or config file)
    pub fn is_available() -> bool {
        if config::config_exists(EXCHANGE_CREDENTIALS_FILE) {
            return true;
        }
        std::env::var("EXCHANGE_EMAIL").is_ok()
            && std::env::var("EXCHANGE_USERNAME").is_ok()
            && std::env::var("EXCHANGE_PASSWORD").is_ok()
            && std::env::var("EWS_SERVER").is_ok()
    }
}

/// Engine tunables, environment-sourced with safe defaults.
///
/// Recognized variables: `IMPORT_LAST_DAYS`, `DEEP_IMPORT_LAST_DAYS`,
/// `SYNC_GRACE_MINUTES`, `ITEMS_PER_RUN`. An unparsable value logs a
/// warning and keeps the default rather than failing the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Fast-mode look-back in days
    pub fast_look_back_days: i64,
    /// Deep-mode look-back in days
    pub deep_look_back_days: i64,
    /// Grace period in minutes, shared by both modes
    pub grace_minutes: i64,
    /// Upper bound on items processed in one pass
    pub items_per_run: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            fast_look_back_days: 2,
            deep_look_back_days: 10,
            grace_minutes: 180,
            items_per_run: 200,
        }
    }
}

impl SyncSettings {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            fast_look_back_days: parse_var(
                &lookup,
                "IMPORT_LAST_DAYS",
                defaults.fast_look_back_days,
            ),
            deep_look_back_days: parse_var(
                &lookup,
                "DEEP_IMPORT_LAST_DAYS",
                defaults.deep_look_back_days,
            ),
            grace_minutes: parse_var(&lookup, "SYNC_GRACE_MINUTES", defaults.grace_minutes),
            items_per_run: parse_var(&lookup, "ITEMS_PER_RUN", defaults.items_per_run),
        }
    }

    /// Look-back duration for a mode
    pub fn look_back(&self, mode: SyncMode) -> chrono::Duration {
        let days = match mode {
            SyncMode::Fast => self.fast_look_back_days,
            SyncMode::Deep => self.deep_look_back_days,
        };
        chrono::Duration::days(days)
    }

    /// Grace period as a duration
    pub fn grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.grace_minutes)
    }
}

fn parse_var<T: std::str::FromStr + Copy>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparsable {}={:?}, using default", key, raw);
                default
            }
        },
        None => default,
    }
}
