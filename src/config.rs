use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use url::Url;

use crate::calendar::{Credentials, Feed, Settings, WindowConfig};

#[derive(Debug, serde::Deserialize)]
pub struct Config {
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub timezone: Option<String>,
    #[serde(default)]
    pub start_offset_days: u32,
    #[serde(default = "default_num_days")]
    pub num_days: u32,
    #[serde(default = "default_remove_duplicates")]
    pub remove_duplicates: bool,
    #[serde(default)]
    pub calendars: Vec<Calendar>,
}

#[derive(serde::Deserialize)]
pub struct Calendar {
    pub name: Option<String>,
    pub url: Url,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub username: Option<String>,
    pub password_file: Option<PathBuf>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl core::fmt::Debug for Calendar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Calendar")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("color", &self.color)
            .field("icon", &self.icon)
            .field("username", &self.username)
            .field("password_file", &self.password_file)
            .field("password", &"<hidden>")
            .field("token", &"<hidden>")
            .finish()
    }
}

impl Calendar {
    /// Registry key of the calendar; unnamed calendars are keyed by their url.
    pub fn name(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| self.url.to_string(), str::to_owned)
    }

    pub fn feed(&self) -> Feed {
        let credentials = match (&self.username, &self.password, &self.token) {
            (_, _, Some(token)) => Some(Credentials::Bearer(token.clone())),
            (Some(username), password, None) => Some(Credentials::Basic(
                username.clone(),
                password.clone().unwrap_or_default(),
            )),
            (None, _, None) => None,
        };

        Feed {
            name: self.name(),
            url: self.url.clone(),
            color: self.color.clone(),
            icon: self.icon.clone(),
            credentials,
        }
    }
}

impl Config {
    pub fn feeds(&self) -> Vec<Feed> {
        self.calendars.iter().map(Calendar::feed).collect()
    }

    /// Viewer timezone: the configured one, else `$TZ`, else UTC.
    pub fn timezone(&self) -> Result<Tz, Box<dyn std::error::Error>> {
        match &self.timezone {
            Some(name) => Ok(Tz::from_str(name).map_err(|e| format!("timezone '{name}': {e}"))?),
            None => Ok(std::env::var("TZ")
                .ok()
                .and_then(|name| Tz::from_str(&name).ok())
                .unwrap_or(Tz::UTC)),
        }
    }

    pub fn settings(&self) -> Result<Settings, Box<dyn std::error::Error>> {
        Ok(Settings {
            window: WindowConfig {
                start_offset_days: self.start_offset_days,
                num_days: self.num_days,
            },
            dedupe: self.remove_duplicates,
            timezone: self.timezone()?,
        })
    }

    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.num_days == 0 {
            return Err("num_days must be greater than 0".into());
        }

        if self.interval == 0 {
            return Err("interval must be greater than 0".into());
        }

        let mut names = BTreeSet::new();
        for calendar in &self.calendars {
            let name = calendar.name();

            if !matches!(calendar.url.scheme(), "http" | "https" | "webcal") {
                return Err(format!("[{name}] unsupported url scheme '{}'", calendar.url.scheme()).into());
            }

            if !names.insert(name) {
                return Err(format!("calendar name '{}' is used twice", calendar.name()).into());
            }
        }

        self.timezone()?;

        Ok(())
    }
}

pub fn init(path: impl AsRef<Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let string = std::fs::read_to_string(path)?;

    parse(&string)
}

pub fn parse(string: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config: Config = toml::from_str(string)?;

    for calendar in &mut config.calendars {
        if let Some(file) = &calendar.password_file {
            let password = std::fs::read_to_string(file)?;

            calendar.password = Some(password.trim().to_owned());
        }
    }

    config.validate()?;

    Ok(config)
}

const fn default_interval() -> u64 {
    1800
}

const fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

const fn default_num_days() -> u32 {
    5
}

const fn default_remove_duplicates() -> bool {
    true
}
