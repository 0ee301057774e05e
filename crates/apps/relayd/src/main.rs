//! relayd - mailbox relay and checklist trigger service
//!
//! Long-running service with no scheduler of its own: an external cron
//! hits the HTTP trigger endpoints, each of which runs one bounded unit
//! of work and reports the outcome as JSON.

use anyhow::Result;
use checklist::{BotConfig, ChecklistTracker, TelegramClient};
use log::{error, info, warn};
use relay::{
    AuthorizedUser, EwsClient, ExchangeCredentials, GmailAuth, GmailImporter, SqliteStateStore,
    StateStore, SyncEngine, SyncSettings,
};
use std::sync::Arc;

mod server;

use server::AppState;

const DEFAULT_PORT: u16 = 8080;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let state = match build_state() {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to start relayd: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::serve(state, port_from_env()) {
        error!("Server terminated: {:#}", e);
        std::process::exit(1);
    }
}

fn build_state() -> Result<AppState> {
    let settings = SyncSettings::from_env();
    info!(
        "Sync settings: fast look-back {}d, deep look-back {}d, grace {}min, cap {} items/run",
        settings.fast_look_back_days,
        settings.deep_look_back_days,
        settings.grace_minutes,
        settings.items_per_run
    );

    let db_path = config::ensure_state_dir()?.join("relay.db");
    let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::new(&db_path)?);
    info!("State store ready at {}", db_path.display());

    let exchange = match ExchangeCredentials::load() {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("Exchange credentials not found: {}", e);
            warn!(
                "To configure the source mailbox, either:\n\
                 1. Place exchange-credentials.json in the relay config directory\n\
                 2. Or set EXCHANGE_EMAIL, EXCHANGE_USERNAME, EXCHANGE_PASSWORD and EWS_SERVER"
            );
            None
        }
    };

    let gmail = match AuthorizedUser::load() {
        Ok(user) => Some(user),
        Err(e) => {
            warn!("Gmail token not found: {}", e);
            warn!(
                "To configure the destination mailbox, either:\n\
                 1. Place gmail-token.json in the relay config directory\n\
                 2. Or set GMAIL_TOKEN_JSON to the authorized-user JSON"
            );
            None
        }
    };

    let mut relaying_for = None;
    let engine = match (exchange, gmail) {
        (Some(exchange), Some(gmail)) => {
            let source = EwsClient::new(&exchange)?;
            let importer = GmailImporter::new(GmailAuth::new(gmail));
            info!("Relay engine ready, relaying mail for {}", exchange.email);
            relaying_for = Some(exchange.email);
            Some(SyncEngine::new(
                Arc::new(source),
                Arc::new(importer),
                store.clone(),
                settings,
            ))
        }
        _ => {
            warn!("Relay engine disabled until both mailboxes are configured");
            None
        }
    };

    let tracker = match BotConfig::load() {
        Ok(bot) => {
            info!("Checklist bot configured for chat {}", bot.chat_id);
            Some(ChecklistTracker::new(
                TelegramClient::new(&bot.bot_token),
                bot.chat_id,
            ))
        }
        Err(e) => {
            warn!("Checklist bot not configured: {}", e);
            None
        }
    };

    Ok(AppState {
        engine,
        store,
        tracker,
        relaying_for,
    })
}

fn port_from_env() -> u16 {
    match std::env::var("PORT") {
        Ok(raw) => match raw.trim().parse() {
            Ok(port) => port,
            Err(_) => {
                warn!("Ignoring unparsable PORT={:?}, using default", raw);
                DEFAULT_PORT
            }
        },
        Err(_) => DEFAULT_PORT,
    }
}
