use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ical_agenda::calendar::{Client, Engine, Feed};
use ical_agenda::config::Config;
use ical_agenda::view;

pub struct App {
    engine: Arc<Engine>,
    feeds: Vec<Feed>,
    interval: Duration,
}

impl App {
    pub fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let client = Client::new(&config.user_agent, config.timeout());

        Ok(Self {
            engine: Arc::new(Engine::new(client, config.settings()?)),
            feeds: config.feeds(),
            interval: config.interval(),
        })
    }

    /// Refreshes every feed one after another and prints the agenda.
    pub fn run_once(&self) {
        for feed in &self.feeds {
            if let Err(err) = self.engine.refresh(feed) {
                log::debug!("[{}] Showing previous occurrences after: {err}", feed.name);
            }
        }

        self.print();
    }

    /// One refresh loop per feed, the agenda is printed every interval.
    pub fn run(self) -> ! {
        if self.feeds.is_empty() {
            log::warn!("No calendars configured");
        }

        for feed in self.feeds.clone() {
            let engine = Arc::clone(&self.engine);
            let interval = self.interval;

            thread::spawn(move || loop {
                if let Err(err) = engine.refresh(&feed) {
                    log::debug!("[{}] Retrying in {}s after: {err}", feed.name, interval.as_secs());
                }

                thread::sleep(interval);
            });
        }

        loop {
            thread::sleep(Duration::from_secs(5).min(self.interval));

            if self.engine.registry().len_sources() + self.engine.errors().len() >= self.feeds.len() {
                break;
            }
        }

        loop {
            self.print();

            thread::sleep(self.interval);
        }
    }

    fn print(&self) {
        let tz = self.engine.settings().timezone;

        print!("{}", view::render(&self.engine.snapshot(), tz));
        print!("{}", view::render_errors(&self.engine.errors()));
    }
}
