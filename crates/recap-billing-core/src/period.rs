//! Usage window rules
//!
//! Two kinds of window exist. An active subscription with a known cycle end
//! counts over `[period_start, period_end)` and rolls over once `now` is
//! strictly past the end. Everything else counts per UTC calendar month.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use recap_types::SubscriptionState;

/// Whether the stored window has expired at `now`
///
/// A paid window whose start already lies past its end was advanced by the
/// gate while the billing provider's renewal had not arrived yet; it counts
/// as current until the provider reports a new cycle.
pub fn needs_reset(state: &SubscriptionState, now: DateTime<Utc>) -> bool {
    match state.paid_period_end() {
        Some(end) => {
            let already_rolled = state.period_start.is_some_and(|start| start > end);
            now > end && !already_rolled
        }
        None => {
            let start = state.period_start_or(now);
            (start.year(), start.month()) != (now.year(), now.month())
        }
    }
}

/// When the window containing `now` ends
///
/// Paid windows end at the billing cycle end. Calendar windows, and paid
/// windows whose end is unknown or already passed, end at the first instant
/// of the next UTC month.
pub fn resets_at(state: &SubscriptionState, now: DateTime<Utc>) -> DateTime<Utc> {
    match state.paid_period_end() {
        Some(end) if end >= now => end,
        _ => start_of_next_month(now),
    }
}

/// First instant of the calendar month after `now`
pub fn start_of_next_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };

    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
