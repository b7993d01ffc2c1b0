use chrono::{DateTime, Timelike as _, Utc};
use chrono_tz::Tz;

/// Tolerance band around 24 hours for feeds that encode all-day events as timed spans.
const NEAR_DAY_MIN_MS: i64 = 23 * 3_600_000 + 1_800_000;
const NEAR_DAY_MAX_MS: i64 = 24 * 3_600_000 + 1_800_000;
/// Latest local start hour still treated as a shifted midnight.
const LATEST_MIDNIGHT_HOUR: u32 = 5;

/// Decides whether an occurrence is a full-day event.
///
/// A declared date-only value always wins. Otherwise a zero-length entry, or a span of
/// roughly one day starting in the early local hours, counts as full-day.
pub fn is_full_day(start: DateTime<Utc>, end: DateTime<Utc>, date_only: bool, viewer: Tz) -> bool {
    if date_only || start == end {
        return true;
    }

    let duration = (end - start).num_milliseconds();

    (NEAR_DAY_MIN_MS..=NEAR_DAY_MAX_MS).contains(&duration)
        && start.with_timezone(&viewer).hour() <= LATEST_MIDNIGHT_HOUR
}
