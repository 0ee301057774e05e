//! Bot configuration loading

use anyhow::{Context, Result};
use serde::Deserialize;

/// Bot credentials filename in the relay config directory
const BOT_CONFIG_FILE: &str = "telegram-bot.json";

/// Telegram bot token and the chat the checklist is posted to
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub bot_token: String,
    pub chat_id: i64,
}

impl BotConfig {
    /// Load bot configuration using the following priority:
    /// 1. Runtime environment variables
    /// 2. JSON file (~/.config/relay/telegram-bot.json)
    pub fn load() -> Result<Self> {
        if let Ok(config) = Self::from_env() {
            return Ok(config);
        }

        if config::config_exists(BOT_CONFIG_FILE) {
            return config::load_json(BOT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load bot configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let bot_token =
            std::env::var("BOT_TOKEN").context("BOT_TOKEN environment variable not set")?;
        let chat_id = std::env::var("CHAT_ID")
            .context("CHAT_ID environment variable not set")?
            .trim()
            .parse()
            .context("CHAT_ID must be a numeric chat id")?;

        Ok(Self { bot_token, chat_id })
    }

    /// Check if bot configuration is available (env vars or config file)
    pub fn is_available() -> bool {
        if config::config_exists(BOT_CONFIG_FILE) {
            return true;
        }
        std::env::var("BOT_TOKEN").is_ok() && std::env::var("CHAT_ID").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_config_from_json() {
        let json = r#"{
            "bot_token": "123456:ABC-DEF",
            "chat_id": -1001234567890
        }"#;

        let config: BotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bot_token, "123456:ABC-DEF");
        assert_eq!(config.chat_id, -1001234567890);
    }
}
