use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;

use super::event::Occurrence;
use super::registry::Snapshot;
use super::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub start_offset_days: u32,
    pub num_days: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start_offset_days: 0,
            num_days: 5,
        }
    }
}

/// The local date range shown to the viewer, `num_days` whole days long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayWindow {
    timezone: Tz,
    first_day: NaiveDate,
    num_days: u32,
    start_millis: i64,
    end_millis: i64,
}

impl DisplayWindow {
    pub fn new(now: DateTime<Utc>, config: &WindowConfig, timezone: Tz) -> Self {
        let today = now.with_timezone(&timezone).date_naive();
        let first_day = today + Days::new(u64::from(config.start_offset_days));
        let num_days = config.num_days.max(1);
        let after_last = first_day + Days::new(u64::from(num_days));

        Self {
            timezone,
            first_day,
            num_days,
            start_millis: time::local_midnight(first_day, timezone).timestamp_millis(),
            end_millis: time::local_midnight(after_last, timezone).timestamp_millis() - 1,
        }
    }

    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    pub const fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub const fn num_days(&self) -> u32 {
        self.num_days
    }

    /// Local midnight of the first day.
    pub const fn start_millis(&self) -> i64 {
        self.start_millis
    }

    /// Last millisecond of the last day, inclusive.
    pub const fn end_millis(&self) -> i64 {
        self.end_millis
    }
}

/// Occurrences bucketed by the local calendar day they start on, in ascending date order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayGroups {
    days: BTreeMap<NaiveDate, Vec<Occurrence>>,
}

impl DayGroups {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Number of day buckets.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn occurrence_count(&self) -> usize {
        self.days.values().map(Vec::len).sum()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&[Occurrence]> {
        self.days.get(&date).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &[Occurrence])> {
        self.days.iter().map(|(date, list)| (date, list.as_slice()))
    }

    /// Day keys formatted as `YYYY-MM-DD`.
    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.days.keys().map(|date| date.format("%Y-%m-%d").to_string())
    }
}

/// Merges, deduplicates, windows, sorts and groups all registered occurrences.
///
/// Pure and idempotent; the same snapshot and window always give the same groups.
pub fn compute(snapshot: &Snapshot, window: &DisplayWindow, dedupe: bool) -> DayGroups {
    let mut working = snapshot
        .values()
        .flat_map(|list| list.iter())
        .collect::<Vec<_>>();

    if dedupe {
        let mut seen = HashSet::new();
        working.retain(|occurrence| seen.insert(occurrence.duplicate_key()));
    }

    working.retain(|occurrence| occurrence.overlaps(window.start_millis, window.end_millis));

    // stable, equal starts keep their merge order
    working.sort_by_key(|occurrence| occurrence.start_millis);

    let mut days: BTreeMap<NaiveDate, Vec<Occurrence>> = BTreeMap::new();
    for occurrence in working {
        if let Some(date) = time::local_date(occurrence.start_millis, window.timezone) {
            days.entry(date).or_default().push(occurrence.clone());
        }
    }

    DayGroups { days }
}
