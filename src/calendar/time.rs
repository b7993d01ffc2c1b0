use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone as _, Utc};
use chrono_tz::Tz;

pub const EARLIEST_NAIVE_TIME: NaiveTime = NaiveTime::MIN;

/// First instant of `date` in `tz`.
///
/// Zones that skip midnight on DST changes start the day at the first valid hour instead.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    (0..=3)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|naive| tz.from_local_datetime(&naive).earliest())
        .map_or_else(
            || date.and_time(EARLIEST_NAIVE_TIME).and_utc(),
            |dt| dt.with_timezone(&Utc),
        )
}

pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Local calendar date of a millisecond timestamp as seen from `tz`.
pub fn local_date(millis: i64, tz: Tz) -> Option<NaiveDate> {
    from_millis(millis).map(|dt| dt.with_timezone(&tz).date_naive())
}
