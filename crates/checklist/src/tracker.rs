//! Daily checklist posting and progress reminders

use anyhow::Result;
use chrono::{DateTime, Local};
use log::{info, warn};
use std::sync::Mutex;

use crate::list::{self, ChecklistState};
use crate::telegram::TelegramClient;

/// Minimum gap between two checklist posts on the same day.
const RESEND_GUARD_MINUTES: i64 = 60;

/// Outcome of a daily post attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyOutcome {
    Posted,
    AlreadyPostedToday,
}

/// Outcome of a progress check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    Reminded { remaining: usize },
    AllDone,
    NoChecklist,
}

struct TrackerState {
    current: Option<ChecklistState>,
    last_posted: Option<DateTime<Local>>,
}

/// Posts the daily checklist and nags about unfinished items.
///
/// State lives in memory only. A restart forgets the current day's
/// checklist and the next scheduled trigger posts a fresh one.
pub struct ChecklistTracker {
    client: TelegramClient,
    chat_id: i64,
    state: Mutex<TrackerState>,
}

impl ChecklistTracker {
    pub fn new(client: TelegramClient, chat_id: i64) -> Self {
        Self {
            client,
            chat_id,
            state: Mutex::new(TrackerState {
                current: None,
                last_posted: None,
            }),
        }
    }

    /// Post today's checklist unless one already went out within the
    /// guard window.
    pub fn send_daily(&self) -> Result<DailyOutcome> {
        let now = Local::now();
        let mut state = self.state.lock().unwrap();

        if recently_posted(state.last_posted, now) {
            info!("Checklist already posted recently, skipping");
            return Ok(DailyOutcome::AlreadyPostedToday);
        }

        let checklist = ChecklistState::new();
        let today = now.format("%Y-%m-%d").to_string();
        let text = list::render_checklist(&today, &checklist);
        let keyboard = list::build_keyboard(&checklist);

        let message_id = self
            .client
            .send_message(self.chat_id, &text, Some(keyboard))?;

        // Pinning needs admin rights; the checklist is useful without it.
        if let Err(e) = self.client.pin_message(self.chat_id, message_id) {
            warn!("Could not pin checklist message {}: {}", message_id, e);
        }

        state.current = Some(checklist);
        state.last_posted = Some(now);
        info!("Posted checklist for {} as message {}", today, message_id);

        Ok(DailyOutcome::Posted)
    }

    /// Send a reminder listing unfinished daily items. Silent when the
    /// day's items are all done.
    pub fn check_progress(&self) -> Result<ProgressOutcome> {
        let state = self.state.lock().unwrap();
        let Some(checklist) = state.current.as_ref() else {
            info!("No checklist posted yet, nothing to check");
            return Ok(ProgressOutcome::NoChecklist);
        };

        let remaining = list::remaining_daily_items(checklist);
        if remaining.is_empty() {
            info!("All daily items done, no reminder needed");
            return Ok(ProgressOutcome::AllDone);
        }

        let time_str = Local::now().format("%H:%M").to_string();
        let text = list::render_reminder(&time_str, &remaining);
        self.client.send_message(self.chat_id, &text, None)?;
        info!("Sent progress reminder, {} item(s) remaining", remaining.len());

        Ok(ProgressOutcome::Reminded {
            remaining: remaining.len(),
        })
    }
}

/// A post within the guard window on the same calendar day is a repeat
/// trigger, not a new day.
fn recently_posted(last: Option<DateTime<Local>>, now: DateTime<Local>) -> bool {
    match last {
        Some(last) => {
            last.date_naive() == now.date_naive()
                && (now - last).num_minutes() < RESEND_GUARD_MINUTES
        }
        None => false,
    }
}
