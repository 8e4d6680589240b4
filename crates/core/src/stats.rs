use chrono::{DateTime, Utc};

use crate::model::{SessionData, UserProfile};
use crate::time::elapsed_days_ceil;

/// Whether activity at `now` continues a streak last active at `last`.
///
/// Anything within one day (rounded up) counts, same-day activity included.
#[must_use]
pub fn streak_continues(last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    elapsed_days_ceil(last, now) <= 1
}

/// Profile after recording one completed session at `now`.
#[must_use]
pub fn apply_session(profile: &UserProfile, data: &SessionData, now: DateTime<Utc>) -> UserProfile {
    let mut next = profile.clone();

    next.study_sessions = next.study_sessions.saturating_add(1);
    next.total_cards = next.total_cards.saturating_add(data.cards_studied);
    next.average_accuracy = running_mean(
        u64::from(profile.average_accuracy),
        u64::from(next.study_sessions),
        u64::from(data.accuracy),
    );

    next.current_streak = if streak_continues(profile.last_activity, now) {
        next.current_streak.saturating_add(1)
    } else {
        1
    };
    next.longest_streak = next.longest_streak.max(next.current_streak);
    next.last_activity = now;

    next
}

/// Profile after one more deck was created.
#[must_use]
pub fn apply_deck_created(profile: &UserProfile) -> UserProfile {
    let mut next = profile.clone();
    next.total_decks = next.total_decks.saturating_add(1);
    next
}

// round((old * (n - 1) + sample) / n), half up
fn running_mean(old: u64, n: u64, sample: u64) -> u32 {
    if n == 0 {
        return 0;
    }
    let sum = old * (n - 1) + sample;
    let mean = (sum * 2 + n) / (n * 2);
    u32::try_from(mean).unwrap_or(u32::MAX)
}
