//! RRULE expansion into concrete instances.

use std::collections::BTreeSet;
use std::ops::Range;

use chrono::{DateTime, Days, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone as _, Utc};
use chrono_tz::Tz;
use rrule::{RRuleError, RRuleSet};

use super::aggregate::DisplayWindow;
use super::event::EventDefinition;
use super::time;

/// Upper bound of generated instances per rule and window.
pub const MAX_INSTANCES: u16 = 1024;

/// Expands `event` into `(start, end)` instances starting inside `window` (end exclusive).
///
/// Instances whose generated start equals an EXDATE or an entry of `overridden` are
/// suppressed; the match is on the exact instant. Non-recurring events are returned as is.
///
/// # Errors
/// Returns an error if the rule cannot be evaluated from the event's DTSTART.
pub fn expand(
    event: &EventDefinition,
    window: &Range<DateTime<Utc>>,
    overridden: &BTreeSet<DateTime<Utc>>,
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>, RRuleError> {
    let Some(rule) = &event.rrule else {
        return Ok(vec![(event.start, event.end)]);
    };

    let rule_set: RRuleSet = rule_set_source(event, rule).parse()?;

    // `after`/`before` are exclusive, widen by a second and filter below
    let tz: rrule::Tz = Utc.into();
    let result = rule_set
        .after((window.start - TimeDelta::seconds(1)).with_timezone(&tz))
        .before((window.end + TimeDelta::seconds(1)).with_timezone(&tz))
        .all(MAX_INSTANCES);

    if result.limited {
        log::warn!(
            "Recurrence of '{}' was cut off after {MAX_INSTANCES} instances",
            event.summary
        );
    }

    let duration = event.duration();

    Ok(result
        .dates
        .iter()
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|start| window.contains(start))
        .filter(|start| !event.exception_dates.contains(start) && !overridden.contains(start))
        .map(|start| (start, start + duration))
        .collect())
}

/// The range recurring events are expanded over: the display window widened by a month
/// on each side, so a later change of the offset still finds edge instances.
pub fn expansion_window(display: &DisplayWindow) -> Range<DateTime<Utc>> {
    let first = display.first_day();
    let after_last = first + Days::new(u64::from(display.num_days()));

    let from = first.checked_sub_months(Months::new(1)).unwrap_or(first);
    let to = after_last.checked_add_months(Months::new(1)).unwrap_or(after_last);

    time::local_midnight(from, display.timezone())..time::local_midnight(to, display.timezone())
}

/// DTSTART and RRULE lines in the zone the event was declared in, so wall-clock
/// times survive DST changes.
fn rule_set_source(event: &EventDefinition, rule: &str) -> String {
    let dtstart = if event.timezone == Tz::UTC {
        format!("DTSTART:{}", event.start.format("%Y%m%dT%H%M%SZ"))
    } else {
        format!(
            "DTSTART;TZID={}:{}",
            event.timezone.name(),
            event.start.with_timezone(&event.timezone).format("%Y%m%dT%H%M%S")
        )
    };

    format!("{dtstart}\nRRULE:{}", utc_until(rule, event.timezone))
}

/// Rewrites a date-only or floating UNTIL to UTC, the only form accepted next to
/// the DTSTART written above. Dates bound the whole day in `tz`.
fn utc_until(rule: &str, tz: Tz) -> String {
    rule.split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => until_instant(value, tz)
                .map_or_else(
                    || part.to_owned(),
                    |until| format!("UNTIL={}", until.format("%Y%m%dT%H%M%SZ")),
                ),
            _ => part.to_owned(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// `None` for values already in UTC or not understood; those are passed through.
fn until_instant(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y%m%d") {
        let next = date.succ_opt()?;

        return Some(time::local_midnight(next, tz) - TimeDelta::seconds(1));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;

    Some(
        tz.from_local_datetime(&naive)
            .earliest()
            .map_or_else(|| naive.and_utc(), |dt| dt.with_timezone(&Utc)),
    )
}
