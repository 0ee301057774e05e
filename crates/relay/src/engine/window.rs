//! Sync window computation
//!
//! A pass covers `[start, end)` where `end` always trails the current time
//! by the grace period, so items the source has not finished settling are
//! left for a later pass. `start` resumes from the stored checkpoint
//! (re-covering the grace period for safety) but never reaches further
//! back than the mode's look-back bound.

use chrono::{DateTime, Utc};

use crate::config::SyncSettings;
use crate::models::{SyncMode, SyncWindow};

/// Compute the window a pass should cover
pub fn compute_window(
    mode: SyncMode,
    checkpoint: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    settings: &SyncSettings,
) -> SyncWindow {
    let floor = now - settings.look_back(mode);
    let start = match checkpoint {
        Some(cp) => (cp - settings.grace()).max(floor),
        None => floor,
    };
    let end = now - settings.grace();

    SyncWindow { start, end }
}

/// Candidate checkpoint after a clean pass. Never moves backwards: a
/// window whose end trails the stored checkpoint (possible right after
/// a previous pass, when the grace period pushes `end` into the past)
/// leaves the checkpoint where it was.
pub fn next_checkpoint(
    checkpoint: Option<DateTime<Utc>>,
    window_end: DateTime<Utc>,
) -> DateTime<Utc> {
    match checkpoint {
        Some(cp) => cp.max(window_end),
        None => window_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2025-06-15T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_first_run_uses_look_back() {
        let now = t0();
        let settings = SyncSettings::default();

        let window = compute_window(SyncMode::Deep, None, now, &settings);

        assert_eq!(window.start, now - Duration::days(10));
        assert_eq!(window.end, now - Duration::minutes(180));
        assert!(!window.is_empty());
    }

    #[test]
    fn test_resume_overlaps_grace_period() {
        let now = t0();
        let settings = SyncSettings::default();
        let checkpoint = now - Duration::hours(12);

        let window = compute_window(SyncMode::Fast, Some(checkpoint), now, &settings);

        assert_eq!(window.start, checkpoint - Duration::minutes(180));
        assert_eq!(window.end, now - Duration::minutes(180));
    }

    #[test]
    fn test_stale_checkpoint_clamped_to_look_back() {
        let now = t0();
        let settings = SyncSettings::default();
        // Checkpoint from a month ago: fast mode still only reaches 2 days back
        let checkpoint = now - Duration::days(30);

        let window = compute_window(SyncMode::Fast, Some(checkpoint), now, &settings);

        assert_eq!(window.start, now - Duration::days(2));
    }

    #[test]
    fn test_back_to_back_passes_re_cover_the_grace_span() {
        let settings = SyncSettings::default();
        let first_now = t0();
        // Checkpoint left by a pass that ran at first_now
        let checkpoint = first_now - Duration::minutes(180);

        let second_now = first_now + Duration::minutes(5);
        let window = compute_window(SyncMode::Fast, Some(checkpoint), second_now, &settings);

        assert_eq!(window.start, checkpoint - Duration::minutes(180));
        assert_eq!(window.end, second_now - Duration::minutes(180));
        assert!(!window.is_empty());
    }

    #[test]
    fn test_grace_beyond_look_back_yields_empty_window() {
        let settings = SyncSettings {
            fast_look_back_days: 1,
            grace_minutes: 2 * 24 * 60,
            ..SyncSettings::default()
        };

        let window = compute_window(SyncMode::Fast, None, t0(), &settings);

        assert!(window.is_empty());
    }

    #[test]
    fn test_next_checkpoint_advances_to_window_end() {
        let end = t0();
        assert_eq!(next_checkpoint(None, end), end);
        assert_eq!(next_checkpoint(Some(end - Duration::hours(6)), end), end);
    }

    #[test]
    fn test_next_checkpoint_never_regresses() {
        let checkpoint = t0();
        let earlier_end = checkpoint - Duration::minutes(175);

        assert_eq!(next_checkpoint(Some(checkpoint), earlier_end), checkpoint);
    }
}
