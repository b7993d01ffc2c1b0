use std::fmt::Write as _;

use chrono_tz::Tz;

use crate::calendar::{DayGroups, FeedError, Occurrence};

pub const EMPTY: &str = "No upcoming events";

/// Plain-text agenda: one header per day, one line per occurrence.
pub fn render(groups: &DayGroups, tz: Tz) -> String {
    if groups.is_empty() {
        return format!("{EMPTY}\n");
    }

    let mut out = String::new();

    for (date, occurrences) in groups.iter() {
        let _ = writeln!(out, "{}", date.format("%a %d.%m.%Y"));

        for occurrence in occurrences {
            let _ = writeln!(out, "  {}", oneliner(occurrence, tz));
        }
    }

    out
}

/// One line per source whose last refresh failed.
pub fn render_errors(errors: &[FeedError]) -> String {
    errors.iter().fold(String::new(), |mut out, error| {
        let _ = writeln!(out, "! {error}");
        out
    })
}

fn oneliner(occurrence: &Occurrence, tz: Tz) -> String {
    let mut info = String::new();

    if occurrence.is_full_day {
        info.push_str("all day");
    } else if let (Some(start), Some(end)) = (occurrence.start(), occurrence.end()) {
        let start = start.with_timezone(&tz);
        let end = end.with_timezone(&tz);

        info.push_str(&start.format("%H:%M").to_string());
        info.push_str(" - ");

        if end.date_naive() != start.date_naive() {
            info.push_str(&end.format("%a ").to_string());
        }

        info.push_str(&end.format("%H:%M").to_string());
    }

    let mut line = format!("{info:<15} {}", occurrence.title);

    if !occurrence.location.is_empty() {
        let _ = write!(line, " @ {}", occurrence.location);
    }

    let _ = write!(line, " [{}]", occurrence.source_name);

    line
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use chrono_tz::Europe::Berlin;

    use super::*;
    use crate::calendar::{compute, DisplayWindow, WindowConfig};

    fn occurrence(title: &str, start: i64, end: i64, is_full_day: bool) -> Occurrence {
        Occurrence {
            source_name: "Work".to_owned(),
            title: title.to_owned(),
            description: String::new(),
            location: String::new(),
            start_millis: start,
            end_millis: end,
            is_full_day,
            color: None,
            icon: None,
        }
    }

    fn at(d: u32, h: u32, m: u32) -> i64 {
        Berlin.with_ymd_and_hms(2024, 5, d, h, m, 0).unwrap().timestamp_millis()
    }

    fn groups(list: Vec<Occurrence>) -> DayGroups {
        let snapshot = BTreeMap::from([("Work".to_owned(), Arc::new(list))]);
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 6, 0, 0).unwrap();

        compute(&snapshot, &DisplayWindow::new(now, &WindowConfig::default(), Berlin), true)
    }

    #[test]
    fn empty_agenda_says_so() {
        assert_eq!(render(&DayGroups::default(), Berlin), "No upcoming events\n");
    }

    #[test]
    fn full_day_events_have_no_time_range() {
        let groups = groups(vec![
            occurrence("Holiday", at(14, 0, 0), at(15, 0, 0), true),
            occurrence("Review", at(14, 10, 0), at(14, 11, 30), false),
        ]);

        let text = render(&groups, Berlin);

        assert_eq!(
            text,
            "Tue 14.05.2024\n  all day         Holiday [Work]\n  10:00 - 11:30   Review [Work]\n"
        );
    }

    #[test]
    fn spans_past_midnight_name_the_end_day() {
        let groups = groups(vec![occurrence("Late show", at(14, 23, 50), at(15, 0, 30), false)]);

        let text = render(&groups, Berlin);

        assert!(text.contains("23:50 - Wed 00:30"));
    }

    #[test]
    fn errors_are_listed_per_source() {
        let errors = vec![FeedError {
            source_name: "Work".to_owned(),
            message: "transport error: HTTP 503".to_owned(),
        }];

        assert_eq!(render_errors(&errors), "! [Work] transport error: HTTP 503\n");
    }
}
