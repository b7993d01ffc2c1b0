use std::sync::Arc;
use std::time::Duration;

use base64::prelude::*;
use ureq::Agent;

use super::feed::{Credentials, Feed};

/// Retrieves the raw calendar text of a feed.
pub trait Fetch: Send + Sync {
    /// # Errors
    /// Returns an error if the feed is unreachable or answers with a non-success status.
    fn fetch(&self, feed: &Feed) -> Result<String, Error>;
}

impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    fn fetch(&self, feed: &Feed) -> Result<String, Error> {
        (**self).fetch(feed)
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    agent: Agent,
}

impl Client {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .user_agent(user_agent)
                .timeout(timeout)
                .build(),
        }
    }
}

impl Fetch for Client {
    fn fetch(&self, feed: &Feed) -> Result<String, Error> {
        let mut request = self
            .agent
            .get(&feed.fetch_url())
            .set("Accept", "text/calendar, */*")
            .set("Cache-Control", "no-cache");

        if let Some(credentials) = &feed.credentials {
            request = request.set("Authorization", &auth_header(credentials));
        }

        Ok(request.call()?.into_string()?)
    }
}

fn auth_header(credentials: &Credentials) -> String {
    match credentials {
        Credentials::Basic(username, password) => {
            format!(
                "Basic {}",
                BASE64_STANDARD.encode(format!("{username}:{password}"))
            )
        }
        Credentials::Bearer(token) => format!("Bearer {token}"),
    }
}

/// Errors that abort one refresh cycle of one feed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    Http,
    Parsing,
}

impl Error {
    pub fn parsing(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parsing,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ErrorKind::Http => write!(f, "transport error: {}", self.message),
            ErrorKind::Parsing => write!(f, "parse error: {}", self.message),
        }
    }
}

impl std::error::Error for Error {}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        let message = match e {
            ureq::Error::Status(code, _) => format!("HTTP {code}"),
            ureq::Error::Transport(transport) => transport.to_string(),
        };

        Self {
            kind: ErrorKind::Http,
            message,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Http,
            message: e.to_string(),
        }
    }
}
