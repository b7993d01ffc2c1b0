use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Europe::Berlin;
use ical_agenda::calendar::{Engine, Error, ErrorKind, Feed, Fetch, Settings, WindowConfig};
use url::Url;

/// Serves canned documents keyed by feed name.
#[derive(Default)]
struct FakeFetcher {
    documents: Mutex<HashMap<String, Result<String, Error>>>,
}

impl FakeFetcher {
    fn serve(&self, name: &str, response: Result<String, Error>) {
        self.documents.lock().unwrap().insert(name.to_owned(), response);
    }
}

impl Fetch for FakeFetcher {
    fn fetch(&self, feed: &Feed) -> Result<String, Error> {
        self.documents
            .lock()
            .unwrap()
            .get(&feed.name)
            .cloned()
            .unwrap_or_else(|| Err(Error::parsing("no document")))
    }
}

fn calendar(events: &[&str]) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n{}END:VCALENDAR\r\n",
        events.concat()
    )
}

fn feed(name: &str) -> Feed {
    Feed::new(name, Url::parse(&format!("https://example.org/{name}.ics")).unwrap())
}

fn settings(num_days: u32) -> Settings {
    Settings {
        window: WindowConfig {
            start_offset_days: 0,
            num_days,
        },
        dedupe: true,
        timezone: Berlin,
    }
}

fn berlin(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Berlin.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap().with_timezone(&Utc)
}

const TEAM_SYNC: &str = "BEGIN:VEVENT\r\n\
UID:sync@example.org\r\n\
SUMMARY:Team Sync\r\n\
DTSTART;TZID=Europe/Berlin:20240514T100000\r\n\
DTEND;TZID=Europe/Berlin:20240514T103000\r\n\
END:VEVENT\r\n";

const VTODO: &str = "BEGIN:VTODO\r\n\
UID:todo@example.org\r\n\
SUMMARY:Not an event\r\n\
END:VTODO\r\n";

#[test]
fn shared_calendar_subscribed_twice_shows_once() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("A", Ok(calendar(&[TEAM_SYNC, VTODO])));
    fetcher.serve("B", Ok(calendar(&[TEAM_SYNC])));

    let engine = Engine::new(Arc::clone(&fetcher), settings(2));
    let now = berlin(2024, 5, 14, 8, 0);

    assert_eq!(engine.refresh_at(&feed("A"), now).unwrap(), 1);
    assert_eq!(engine.refresh_at(&feed("B"), now).unwrap(), 1);

    let groups = engine.snapshot_at(now);
    let today = groups.get(NaiveDate::from_ymd_opt(2024, 5, 14).unwrap()).unwrap();

    assert_eq!(today.len(), 1);
    assert_eq!(today[0].title, "Team Sync");
    assert_eq!(today[0].start_millis, berlin(2024, 5, 14, 10, 0).timestamp_millis());
    assert_eq!(today[0].end_millis, berlin(2024, 5, 14, 10, 30).timestamp_millis());
    assert!(!today[0].is_full_day);
}

#[test]
fn failing_source_keeps_its_last_good_list_and_others_continue() {
    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("A", Ok(calendar(&[TEAM_SYNC])));
    fetcher.serve("B", Ok(calendar(&[])));

    let engine = Engine::new(Arc::clone(&fetcher), settings(2));
    let now = berlin(2024, 5, 14, 8, 0);
    engine.refresh_at(&feed("A"), now).unwrap();
    engine.refresh_at(&feed("B"), now).unwrap();

    fetcher.serve(
        "A",
        Err(Error {
            kind: ErrorKind::Http,
            message: "HTTP 500".to_owned(),
        }),
    );
    fetcher.serve("B", Ok("not a calendar".to_owned()));

    assert!(engine.refresh_at(&feed("A"), now).is_err());
    let error = engine.refresh_at(&feed("B"), now).unwrap_err();
    assert_eq!(error.kind, ErrorKind::Parsing);

    assert_eq!(engine.snapshot_at(now).occurrence_count(), 1);

    let errors = engine.errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].source_name, "A");
    assert_eq!(errors[0].message, "transport error: HTTP 500");
    assert_eq!(errors[1].source_name, "B");
}

#[test]
fn weekly_rule_with_exception_and_all_day_entries() {
    let weekly = "BEGIN:VEVENT\r\n\
UID:weekly@example.org\r\n\
SUMMARY:Planning\r\n\
DTSTART;TZID=Europe/Berlin:20240506T090000\r\n\
DTEND;TZID=Europe/Berlin:20240506T100000\r\n\
RRULE:FREQ=WEEKLY;BYDAY=MO,WE\r\n\
EXDATE;TZID=Europe/Berlin:20240515T090000\r\n\
END:VEVENT\r\n";
    let holiday = "BEGIN:VEVENT\r\n\
UID:holiday@example.org\r\n\
SUMMARY:Holiday\r\n\
DTSTART;VALUE=DATE:20240516\r\n\
DTEND;VALUE=DATE:20240517\r\n\
END:VEVENT\r\n";

    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("Work", Ok(calendar(&[weekly, holiday])));

    let engine = Engine::new(Arc::clone(&fetcher), settings(10));
    let now = berlin(2024, 5, 13, 7, 0);
    engine.refresh_at(&feed("Work"), now).unwrap();

    let groups = engine.snapshot_at(now);
    let planning = groups
        .iter()
        .flat_map(|(_, list)| list.iter())
        .filter(|o| o.title == "Planning")
        .collect::<Vec<_>>();

    let starts = planning.iter().map(|o| o.start_millis).collect::<Vec<_>>();
    assert_eq!(
        starts,
        vec![
            berlin(2024, 5, 13, 9, 0).timestamp_millis(),
            berlin(2024, 5, 20, 9, 0).timestamp_millis(),
            berlin(2024, 5, 22, 9, 0).timestamp_millis(),
        ]
    );
    assert!(planning
        .iter()
        .all(|o| o.end_millis - o.start_millis == TimeDelta::hours(1).num_milliseconds()));

    let thursday = groups.get(NaiveDate::from_ymd_opt(2024, 5, 16).unwrap()).unwrap();
    assert_eq!(thursday.len(), 1);
    assert_eq!(thursday[0].title, "Holiday");
    assert!(thursday[0].is_full_day);
}

#[test]
fn concurrent_refreshes_do_not_interfere() {
    let fetcher = Arc::new(FakeFetcher::default());
    for name in ["A", "B", "C", "D"] {
        fetcher.serve(name, Ok(calendar(&[TEAM_SYNC])));
    }

    let engine = Arc::new(Engine::new(Arc::clone(&fetcher), settings(1)));
    let now = berlin(2024, 5, 14, 8, 0);

    let handles = ["A", "B", "C", "D"]
        .into_iter()
        .map(|name| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || engine.refresh_at(&feed(name), now))
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), 1);
    }

    assert_eq!(engine.registry().len_sources(), 4);
    assert_eq!(engine.registry().get_all().len(), 4);
    assert_eq!(engine.snapshot_at(now).occurrence_count(), 1);
}

#[test]
fn bounded_all_day_series_stops_at_its_until_date() {
    let gym = "BEGIN:VEVENT\r\n\
UID:gym@example.org\r\n\
SUMMARY:Gym\r\n\
DTSTART;VALUE=DATE:20240101\r\n\
DTEND;VALUE=DATE:20240102\r\n\
RRULE:FREQ=WEEKLY;UNTIL=20240222\r\n\
END:VEVENT\r\n";

    let fetcher = Arc::new(FakeFetcher::default());
    fetcher.serve("Home", Ok(calendar(&[gym])));

    let engine = Engine::new(Arc::clone(&fetcher), settings(10));
    let now = berlin(2024, 2, 19, 7, 0);
    engine.refresh_at(&feed("Home"), now).unwrap();

    let groups = engine.snapshot_at(now);

    assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["2024-02-19"]);
    let monday = groups.get(NaiveDate::from_ymd_opt(2024, 2, 19).unwrap()).unwrap();
    assert_eq!(monday[0].title, "Gym");
    assert!(monday[0].is_full_day);
    assert!(engine.errors().is_empty());
}
