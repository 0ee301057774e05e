//! Checklist template and message rendering

/// Daily routine items, in display order.
pub const CHECKLIST_TEMPLATE: [&str; 15] = [
    "Wake up by 07:00",
    "Glass of warm water before breakfast",
    "Supplements",
    "Morning exercises",
    "Breakfast",
    "Water between breakfast and lunch",
    "Lunch",
    "Workout or a walk",
    "Water between lunch and dinner",
    "Dinner by 18:00",
    "At least 2 liters of fluids",
    "Evening practice (stretching, breathing, meditation)",
    "Water flosser",
    "Sauna or hot bath (twice a week)",
    "Lights out by 23:00",
];

/// Items that are not due every day; progress reminders skip them.
pub const WEEKLY_ITEMS: [&str; 1] = ["Sauna or hot bath (twice a week)"];

/// Completion state of one posted checklist.
#[derive(Debug, Clone, Default)]
pub struct ChecklistState {
    states: Vec<bool>,
}

impl ChecklistState {
    /// Fresh state with every item unchecked.
    pub fn new() -> Self {
        Self {
            states: vec![false; CHECKLIST_TEMPLATE.len()],
        }
    }

    /// State with the given per-item flags, padded or truncated to the
    /// template length.
    pub fn from_states(mut states: Vec<bool>) -> Self {
        states.resize(CHECKLIST_TEMPLATE.len(), false);
        Self { states }
    }

    pub fn completed(&self) -> usize {
        self.states.iter().filter(|done| **done).count()
    }

    pub fn total(&self) -> usize {
        self.states.len()
    }

    /// (done, title) pairs in display order.
    pub fn items(&self) -> impl Iterator<Item = (bool, &'static str)> + '_ {
        self.states.iter().copied().zip(CHECKLIST_TEMPLATE)
    }
}

/// Render the checklist message body as Telegram HTML.
pub fn render_checklist(today: &str, state: &ChecklistState) -> String {
    let completed = state.completed();
    let total = state.total();
    let percent = if total == 0 { 0 } else { completed * 100 / total };

    let mut lines = vec![
        format!("✨ <b>Checklist for {today}</b> ✨"),
        String::new(),
        format!("📊 Progress: {completed}/{total} ({percent}%)"),
        String::new(),
    ];
    for (done, title) in state.items() {
        if done {
            lines.push(format!("✅ <s>{title}</s>"));
        } else {
            lines.push(format!("⬜ {title}"));
        }
    }
    lines.join("\n")
}

/// Inline keyboard with one toggle button per item, one per row.
pub fn build_keyboard(state: &ChecklistState) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = state
        .items()
        .enumerate()
        .map(|(idx, (done, title))| {
            let mark = if done { "☑️" } else { "☐" };
            serde_json::json!([{
                "text": format!("{mark} {title}"),
                "callback_data": format!("t:{idx}"),
            }])
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

/// Unfinished items that are due today, weekly ones excluded.
pub fn remaining_daily_items(state: &ChecklistState) -> Vec<&'static str> {
    state
        .items()
        .filter(|&(done, title)| !done && !WEEKLY_ITEMS.contains(&title))
        .map(|(_, title)| title)
        .collect()
}

/// Render the progress reminder for the given unfinished items.
pub fn render_reminder(time_str: &str, remaining: &[&str]) -> String {
    let mut lines = vec![
        format!("⏰ <b>Reminder ({time_str})</b>"),
        String::new(),
        format!("Still to do ({}):", remaining.len()),
    ];
    for title in remaining {
        lines.push(format!("⬜ {title}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_checklist_renders_all_unchecked() {
        let state = ChecklistState::new();
        let text = render_checklist("2025-06-15", &state);

        assert!(text.starts_with("✨ <b>Checklist for 2025-06-15</b> ✨"));
        assert!(text.contains("📊 Progress: 0/15 (0%)"));
        assert!(text.contains("⬜ Breakfast"));
        assert!(!text.contains("<s>"));
    }

    #[test]
    fn test_completed_items_are_struck_through() {
        let mut states = vec![false; CHECKLIST_TEMPLATE.len()];
        states[0] = true;
        let state = ChecklistState::from_states(states);
        let text = render_checklist("2025-06-15", &state);

        assert!(text.contains("📊 Progress: 1/15 (6%)"));
        assert!(text.contains("✅ <s>Wake up by 07:00</s>"));
        assert!(!text.contains("⬜ Wake up by 07:00"));
    }

    #[test]
    fn test_keyboard_has_one_button_per_item() {
        let state = ChecklistState::new();
        let keyboard = build_keyboard(&state);

        let rows = keyboard["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), CHECKLIST_TEMPLATE.len());
        assert_eq!(rows[0][0]["callback_data"], "t:0");
        assert_eq!(rows[14][0]["callback_data"], "t:14");
        assert!(rows[0][0]["text"].as_str().unwrap().starts_with("☐ "));
    }

    #[test]
    fn test_keyboard_marks_completed_items() {
        let mut states = vec![false; CHECKLIST_TEMPLATE.len()];
        states[2] = true;
        let keyboard = build_keyboard(&ChecklistState::from_states(states));

        let rows = keyboard["inline_keyboard"].as_array().unwrap();
        assert!(rows[2][0]["text"].as_str().unwrap().starts_with("☑️ "));
        assert!(rows[3][0]["text"].as_str().unwrap().starts_with("☐ "));
    }

    #[test]
    fn test_reminder_skips_weekly_items() {
        let state = ChecklistState::new();
        let remaining = remaining_daily_items(&state);

        assert_eq!(remaining.len(), CHECKLIST_TEMPLATE.len() - WEEKLY_ITEMS.len());
        assert!(!remaining.contains(&"Sauna or hot bath (twice a week)"));

        let text = render_reminder("14:00", &remaining);
        assert!(text.starts_with("⏰ <b>Reminder (14:00)</b>"));
        assert!(text.contains("Still to do (14):"));
        assert!(text.contains("⬜ Lights out by 23:00"));
    }

    #[test]
    fn test_no_remaining_items_once_daily_work_is_done() {
        let states = CHECKLIST_TEMPLATE
            .iter()
            .map(|title| !WEEKLY_ITEMS.contains(title))
            .collect();
        let state = ChecklistState::from_states(states);

        assert!(remaining_daily_items(&state).is_empty());
    }
}
