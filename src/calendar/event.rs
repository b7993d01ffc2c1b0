use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::time;

/// A parsed VEVENT before recurrence expansion.
///
/// `start`/`end` are absolute instants. `timezone` is the zone DTSTART was declared in
/// and is what the recurrence rule is evaluated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDefinition {
    pub uid: Option<String>,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: Tz,
    pub is_date_only: bool,
    pub rrule: Option<String>,
    pub exception_dates: BTreeSet<DateTime<Utc>>,
    pub recurrence_id: Option<DateTime<Utc>>,
}

impl EventDefinition {
    pub const fn is_recurring(&self) -> bool {
        self.rrule.is_some()
    }

    pub fn duration(&self) -> chrono::TimeDelta {
        self.end - self.start
    }
}

/// One concrete, normalized occurrence. Value object, equality is structural.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub source_name: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_millis: i64,
    pub end_millis: i64,
    pub is_full_day: bool,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl Occurrence {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        time::from_millis(self.start_millis)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        time::from_millis(self.end_millis)
    }

    pub fn duplicate_key(&self) -> (String, i64, i64) {
        (self.title.to_lowercase(), self.start_millis, self.end_millis)
    }

    /// Whether the occurrence intersects the inclusive range `[start, end]`.
    pub const fn overlaps(&self, start: i64, end: i64) -> bool {
        self.start_millis <= end && self.end_millis >= start
    }
}
