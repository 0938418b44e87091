//! Grace period gating of repeated alerts

use chrono::{DateTime, Duration, Utc};

/// Whether a trigger at `now` falls inside the grace period that follows
/// the last surfaced alert. A grace of zero never suppresses.
pub fn in_grace(
    last_triggered: Option<DateTime<Utc>>,
    grace_minutes: i64,
    now: DateTime<Utc>,
) -> bool {
    if grace_minutes <= 0 {
        return false;
    }
    let Some(last) = last_triggered else {
        return false;
    };
    match Duration::try_minutes(grace_minutes) {
        Some(grace) => now - last < grace,
        // Too long to represent, so it never runs out
        None => true,
    }
}
