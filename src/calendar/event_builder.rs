use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone as _, Utc};
use chrono_tz::Tz;
use icalendar::parser::{read_calendar, unfold, Component, Property};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use rrule::{RRule, Unvalidated};

use super::event::EventDefinition;
use super::fetch::Error;
use super::time;

#[derive(Debug)]
pub enum EventBuilderError {
    NoStart,
    InvalidStart,
    InvalidRRule(String),
}

#[derive(Debug, Default)]
pub struct EventBuilder {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<DatePerhapsTime>,
    pub end: Option<DatePerhapsTime>,
    pub duration: Option<String>,
    pub rrule: Option<String>,
    pub exdates: Vec<DatePerhapsTime>,
    pub recurrence_id: Option<DatePerhapsTime>,
}

impl EventBuilder {
    /// Builds the event, resolving floating and date-only values in `viewer`.
    ///
    /// # Errors
    /// Returns an error if the start is missing or cannot be resolved, or the RRULE is malformed.
    /// A missing or unusable end falls back to DURATION, then to the start.
    pub fn build(self, viewer: Tz) -> Result<EventDefinition, EventBuilderError> {
        let raw_start = self.start.ok_or(EventBuilderError::NoStart)?;
        let (start, timezone) = resolve(&raw_start, viewer).ok_or(EventBuilderError::InvalidStart)?;

        let end = self
            .end
            .as_ref()
            .and_then(|end| resolve(end, viewer))
            .map(|(end, _)| end)
            .or_else(|| self.duration.as_deref().and_then(parse_duration).map(|d| start + d))
            .filter(|end| *end >= start)
            .unwrap_or(start);

        if let Some(rrule) = &self.rrule {
            rrule
                .parse::<RRule<Unvalidated>>()
                .map_err(|err| EventBuilderError::InvalidRRule(err.to_string()))?;
        }

        let exception_dates = self
            .exdates
            .iter()
            .filter_map(|exdate| resolve(exdate, viewer))
            .map(|(instant, _)| instant)
            .collect::<BTreeSet<_>>();

        Ok(EventDefinition {
            uid: self.uid,
            summary: self.summary.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            start,
            end,
            timezone,
            is_date_only: matches!(raw_start, DatePerhapsTime::Date(_)),
            rrule: self.rrule,
            exception_dates,
            recurrence_id: self
                .recurrence_id
                .as_ref()
                .and_then(|id| resolve(id, viewer))
                .map(|(instant, _)| instant),
        })
    }

    pub fn set_uid_opt(mut self, uid: Option<String>) -> Self {
        self.uid = uid;
        self
    }

    pub fn set_summary_opt(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }

    pub fn set_description_opt(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn set_location_opt(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn set_start_opt(mut self, start: Option<DatePerhapsTime>) -> Self {
        self.start = start;
        self
    }

    pub fn set_end_opt(mut self, end: Option<DatePerhapsTime>) -> Self {
        self.end = end;
        self
    }

    pub fn set_duration_opt(mut self, duration: Option<String>) -> Self {
        self.duration = duration;
        self
    }

    pub fn set_rrule_opt(mut self, rrule: Option<String>) -> Self {
        self.rrule = rrule;
        self
    }

    pub fn set_exdates(mut self, exdates: Vec<DatePerhapsTime>) -> Self {
        self.exdates = exdates;
        self
    }

    pub fn set_recurrence_id_opt(mut self, recurrence_id: Option<DatePerhapsTime>) -> Self {
        self.recurrence_id = recurrence_id;
        self
    }
}

impl From<&Component<'_>> for EventBuilder {
    fn from(vevent: &Component<'_>) -> Self {
        let text = |name: &str| vevent.find_prop(name).map(|p| unescape(p.val.as_ref()));
        let date = |name: &str| {
            vevent
                .find_prop(name)
                .and_then(|p| DatePerhapsTime::try_from(p).ok())
        };

        Self::default()
            .set_uid_opt(vevent.find_prop("UID").map(|p| p.val.to_string()))
            .set_summary_opt(text("SUMMARY"))
            .set_description_opt(text("DESCRIPTION"))
            .set_location_opt(text("LOCATION"))
            .set_start_opt(date("DTSTART"))
            .set_end_opt(date("DTEND"))
            .set_duration_opt(vevent.find_prop("DURATION").map(|p| p.val.to_string()))
            .set_rrule_opt(vevent.find_prop("RRULE").map(|p| p.val.to_string()))
            .set_exdates(
                vevent
                    .properties
                    .iter()
                    .filter(|p| p.name == "EXDATE")
                    .flat_map(exdate_values)
                    .collect(),
            )
            .set_recurrence_id_opt(date("RECURRENCE-ID"))
    }
}

/// Parses a calendar document into event definitions.
///
/// Components other than VEVENT are ignored, events with unusable fields are dropped.
///
/// # Errors
/// Returns an error if the text is not a well-formed calendar document.
pub fn parse_calendar(text: &str, viewer: Tz) -> Result<Vec<EventDefinition>, Error> {
    let unfolded = unfold(text);
    if !unfolded.contains("BEGIN:VCALENDAR") {
        return Err(Error::parsing("Document contains no VCALENDAR"));
    }

    let calendar = read_calendar(&unfolded).map_err(|err| Error::parsing(err.to_string()))?;

    let events = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .filter_map(|vevent| {
            let builder = EventBuilder::from(vevent);
            let uid = builder.uid.clone().unwrap_or_default();

            match builder.build(viewer) {
                Ok(event) => Some(event),
                Err(err) => {
                    log::warn!("Dropping event '{uid}': {err:?}");
                    None
                }
            }
        })
        .collect();

    Ok(events)
}

/// Resolves a DTSTART-like value to an instant and the zone it was declared in.
fn resolve(value: &DatePerhapsTime, viewer: Tz) -> Option<(DateTime<Utc>, Tz)> {
    match value {
        DatePerhapsTime::Date(date) => Some((time::local_midnight(*date, viewer), viewer)),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Some((*dt, Tz::UTC)),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(dt)) => {
            from_local(dt, viewer).map(|instant| (instant, viewer))
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            let tz = Tz::from_str(tzid.trim_matches('"')).unwrap_or_else(|_| {
                log::debug!("Unknown TZID '{tzid}', using {viewer}");
                viewer
            });

            from_local(date_time, tz).map(|instant| (instant, tz))
        }
    }
}

fn from_local(naive: &NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Splits an EXDATE property, which may carry several comma separated values.
fn exdate_values(prop: &Property) -> Vec<DatePerhapsTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date {
                return NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(DatePerhapsTime::Date);
            }

            let utc = s.ends_with('Z');
            let naive = NaiveDateTime::parse_from_str(s.trim_end_matches('Z'), "%Y%m%dT%H%M%S").ok()?;

            Some(DatePerhapsTime::DateTime(match &tzid {
                _ if utc => CalendarDateTime::Utc(naive.and_utc()),
                Some(tzid) => CalendarDateTime::WithTimezone {
                    date_time: naive,
                    tzid: tzid.clone(),
                },
                None => CalendarDateTime::Floating(naive),
            }))
        })
        .collect()
}

fn parse_duration(value: &str) -> Option<TimeDelta> {
    let duration: std::time::Duration = iso8601::duration(value.trim_start_matches('+'))
        .ok()?
        .into();

    TimeDelta::from_std(duration).ok()
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(escaped) => out.push(escaped),
            None => out.push('\\'),
        }
    }

    out
}
