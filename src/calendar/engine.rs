use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use super::aggregate::{self, DayGroups, DisplayWindow, WindowConfig};
use super::event::{EventDefinition, Occurrence};
use super::event_builder::parse_calendar;
use super::feed::Feed;
use super::fetch::{Client, Error, Fetch};
use super::registry::Registry;
use super::{classify, recurrence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub window: WindowConfig,
    pub dedupe: bool,
    pub timezone: Tz,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            dedupe: true,
            timezone: Tz::UTC,
        }
    }
}

/// Failure of the latest refresh of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedError {
    pub source_name: String,
    pub message: String,
}

impl std::fmt::Display for FeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.source_name, self.message)
    }
}

/// Fetch, parse, expand and classify per feed; aggregate on demand.
///
/// All methods take `&self`, so one engine can be shared between refresh threads.
#[derive(Debug)]
pub struct Engine<F = Client> {
    fetcher: F,
    settings: Settings,
    registry: Registry,
    errors: RwLock<BTreeMap<String, FeedError>>,
}

impl<F: Fetch> Engine<F> {
    pub fn new(fetcher: F, settings: Settings) -> Self {
        Self {
            fetcher,
            settings,
            registry: Registry::new(),
            errors: RwLock::default(),
        }
    }

    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Runs one cycle for `feed` and replaces its registry entry.
    ///
    /// # Errors
    /// Returns transport and parse failures. The registry entry of the feed is left
    /// untouched in that case and the error is recorded for [`Self::errors`].
    pub fn refresh(&self, feed: &Feed) -> Result<usize, Error> {
        self.refresh_at(feed, Utc::now())
    }

    /// Like [`Self::refresh`], expanding recurrences around the window as seen at `now`.
    ///
    /// # Errors
    /// See [`Self::refresh`].
    pub fn refresh_at(&self, feed: &Feed, now: DateTime<Utc>) -> Result<usize, Error> {
        let result = self
            .fetcher
            .fetch(feed)
            .and_then(|text| self.normalize(feed, &text, now));

        match result {
            Ok(occurrences) => {
                let count = occurrences.len();
                self.registry.put(&feed.name, occurrences);
                self.errors
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&feed.name);

                log::info!("[{}] Registered {count} occurrences", feed.name);
                Ok(count)
            }
            Err(error) => {
                log::error!("[{}] Refresh failed: {error}", feed.name);
                self.errors
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(
                        feed.name.clone(),
                        FeedError {
                            source_name: feed.name.clone(),
                            message: error.to_string(),
                        },
                    );

                Err(error)
            }
        }
    }

    /// Turns raw calendar text into the normalized, start-sorted occurrences of `feed`.
    ///
    /// # Errors
    /// Returns an error if `text` is not a calendar document.
    pub fn normalize(&self, feed: &Feed, text: &str, now: DateTime<Utc>) -> Result<Vec<Occurrence>, Error> {
        let definitions = parse_calendar(text, self.settings.timezone)?;
        let window = recurrence::expansion_window(&self.display_window(now));
        let overrides = overridden_instances(&definitions);
        let no_overrides = BTreeSet::new();

        let mut occurrences = Vec::new();
        for definition in &definitions {
            let overridden = definition
                .uid
                .as_deref()
                .filter(|_| definition.is_recurring())
                .and_then(|uid| overrides.get(uid))
                .unwrap_or(&no_overrides);

            match recurrence::expand(definition, &window, overridden) {
                Ok(instances) => occurrences.extend(
                    instances
                        .into_iter()
                        .map(|(start, end)| self.occurrence(feed, definition, start, end)),
                ),
                Err(err) => log::warn!(
                    "[{}] Dropping recurring event '{}': {err}",
                    feed.name,
                    definition.summary
                ),
            }
        }

        occurrences.sort_by_key(|occurrence| occurrence.start_millis);

        log::debug!(
            "[{}] {} definitions expanded to {} occurrences",
            feed.name,
            definitions.len(),
            occurrences.len()
        );

        Ok(occurrences)
    }

    pub fn display_window(&self, now: DateTime<Utc>) -> DisplayWindow {
        DisplayWindow::new(now, &self.settings.window, self.settings.timezone)
    }

    /// Day-grouped view of everything currently registered.
    pub fn snapshot(&self) -> DayGroups {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> DayGroups {
        let snapshot = self.registry.snapshot();

        aggregate::compute(&snapshot, &self.display_window(now), self.settings.dedupe)
    }

    /// Latest failure per source, for sources whose last refresh failed.
    pub fn errors(&self) -> Vec<FeedError> {
        self.errors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn occurrence(
        &self,
        feed: &Feed,
        definition: &EventDefinition,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Occurrence {
        Occurrence {
            source_name: feed.name.clone(),
            title: definition.summary.clone(),
            description: definition.description.clone(),
            location: definition.location.clone(),
            start_millis: start.timestamp_millis(),
            end_millis: end.timestamp_millis(),
            is_full_day: classify::is_full_day(
                start,
                end,
                definition.is_date_only,
                self.settings.timezone,
            ),
            color: feed.color.clone(),
            icon: feed.icon.clone(),
        }
    }
}

/// RECURRENCE-ID instants per UID; these replace the generated instance of the master.
fn overridden_instances(definitions: &[EventDefinition]) -> BTreeMap<&str, BTreeSet<DateTime<Utc>>> {
    let mut overrides: BTreeMap<&str, BTreeSet<DateTime<Utc>>> = BTreeMap::new();

    for definition in definitions {
        if let (Some(uid), Some(id)) = (definition.uid.as_deref(), definition.recurrence_id) {
            overrides.entry(uid).or_default().insert(id);
        }
    }

    overrides
}
