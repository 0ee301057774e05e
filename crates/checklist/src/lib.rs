//! Checklist crate - daily routine checklist posted to a chat
//!
//! Renders a fixed daily checklist as a Telegram HTML message, posts it
//! once per day through the Bot API, and sends scheduled reminders about
//! unfinished items. Toggle buttons are carried on the posted message;
//! acting on them requires a chat webhook, which this service does not
//! serve.

pub mod config;
pub mod list;
pub mod telegram;
pub mod tracker;

pub use config::BotConfig;
pub use list::{
    CHECKLIST_TEMPLATE, ChecklistState, build_keyboard, remaining_daily_items, render_checklist,
    render_reminder,
};
pub use telegram::{TelegramClient, TelegramError};
pub use tracker::{ChecklistTracker, DailyOutcome, ProgressOutcome};
