use url::Url;

/// One configured calendar source. The name is the registry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub name: String,
    pub url: Url,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub credentials: Option<Credentials>,
}

impl Feed {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
            color: None,
            icon: None,
            credentials: None,
        }
    }

    /// The URL actually requested. `webcal://` subscriptions are served over https.
    pub fn fetch_url(&self) -> String {
        match self.url.as_str().strip_prefix("webcal://") {
            Some(rest) => format!("https://{rest}"),
            None => self.url.to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic(String, String),
    Bearer(String),
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<hidden>")
    }
}
