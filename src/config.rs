use std::{env, time::Duration};

use tracing::warn;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const BASE_URL_ENV: &str = "TRAKTOR_API_BASE_URL";
pub const TIMEOUT_MS_ENV: &str = "TRAKTOR_API_TIMEOUT_MS";

/// Immutable settings shared by every request a `Sender` issues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
    timeout: Option<Duration>,
}

impl ApiConfig {
    /// Trailing slashes are stripped so joining with an endpoint always
    /// yields exactly one separator.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reads `TRAKTOR_API_BASE_URL` and `TRAKTOR_API_TIMEOUT_MS`. Missing
    /// variables fall back to defaults; an unparsable timeout is ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let config = Self::new(base_url);

        match lookup(TIMEOUT_MS_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) => config.with_timeout(Duration::from_millis(ms)),
                Err(err) => {
                    warn!("ignoring {TIMEOUT_MS_ENV}={raw:?}: {err}");
                    config
                }
            },
            None => config,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// `base_url + "/" + endpoint`, with the endpoint taken verbatim.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
