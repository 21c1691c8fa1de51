use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use crate::error::ConfigError;
use crate::feed::CategoryRule;
use crate::fetch::RequestHeaders;
use crate::gate::{parse_keywords, DEFAULT_SEEN_CAPACITY};

pub const DEFAULT_FEED_URL: &str = "https://uhrforum.de/forums/-/index.rss";
pub const DEFAULT_PUSHOVER_ENDPOINT: &str = "https://api.pushover.net/1/messages.json";
pub const DEFAULT_WAIT_SECS: u64 = 120;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CHROME_BIN: &str = "google-chrome";
pub const DEFAULT_LOG_FILE: &str = "rss_watcher.log";

/// Where settings come from. Production reads the process environment; tests
/// hand in a map.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetcherKind {
    Chrome,
    Http,
}

#[derive(Debug, Clone)]
pub struct PushoverConfig {
    pub token: String,
    pub user_key: String,
    pub endpoint: Url,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub kind: FetcherKind,
    pub url: Url,
    pub headers: RequestHeaders,
    pub chrome_bin: PathBuf,
    pub timeout: Duration,
}

/// Settings fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub pushover: PushoverConfig,
    pub fetch: FetchConfig,
    pub category: CategoryRule,
    pub seen_capacity: usize,
    pub log_file: PathBuf,
}

impl WatcherConfig {
    pub fn load(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let token = required(source, "PUSHOVER_TOKEN")?;
        let user_key = required(source, "PUSHOVER_USER_KEY")?;
        let endpoint = url_setting(source, "PUSHOVER_ENDPOINT", DEFAULT_PUSHOVER_ENDPOINT)?;

        let kind = match non_empty(source, "WATCHER_FETCHER").as_deref() {
            None | Some("chrome") => FetcherKind::Chrome,
            Some("http") => FetcherKind::Http,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "WATCHER_FETCHER",
                    value: other.to_owned(),
                    reason: "expected `chrome` or `http`".to_owned(),
                })
            }
        };

        let fetch = FetchConfig {
            kind,
            url: url_setting(source, "FEED_URL", DEFAULT_FEED_URL)?,
            headers: RequestHeaders::default(),
            chrome_bin: non_empty(source, "CHROME_BIN")
                .unwrap_or_else(|| DEFAULT_CHROME_BIN.to_owned())
                .into(),
            timeout: Duration::from_secs(number(
                source,
                "FETCH_TIMEOUT",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )?),
        };

        let defaults = CategoryRule::default();
        let category = CategoryRule {
            domain: non_empty(source, "CATEGORY_DOMAIN").unwrap_or(defaults.domain),
            label: non_empty(source, "CATEGORY_LABEL").unwrap_or(defaults.label),
        };

        Ok(Self {
            pushover: PushoverConfig {
                token,
                user_key,
                endpoint,
            },
            fetch,
            category,
            seen_capacity: number(source, "SEEN_CAPACITY", DEFAULT_SEEN_CAPACITY as u64)? as usize,
            log_file: non_empty(source, "WATCHER_LOG_FILE")
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_owned())
                .into(),
        })
    }
}

/// Settings re-read at the start of every cycle so they can change without a
/// restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSettings {
    pub interval: Duration,
    pub keywords: Vec<String>,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_WAIT_SECS),
            keywords: Vec::new(),
        }
    }
}

impl LiveSettings {
    /// Never fails: an unreadable wait time falls back to the default.
    pub fn read(source: &dyn ConfigSource) -> Self {
        let interval = match number(source, "WAIT_TIME", DEFAULT_WAIT_SECS) {
            Ok(secs) => Duration::from_secs(secs),
            Err(err) => {
                warn!(error = %err, default = DEFAULT_WAIT_SECS, "using default wait time");
                Duration::from_secs(DEFAULT_WAIT_SECS)
            }
        };

        let keywords = match non_empty(source, "FILTER_KEYWORDS") {
            Some(raw) => {
                info!("Current filter: {}", raw);
                parse_keywords(&raw)
            }
            None => Vec::new(),
        };

        Self { interval, keywords }
    }
}

fn non_empty(source: &dyn ConfigSource, key: &str) -> Option<String> {
    source
        .get(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required(source: &dyn ConfigSource, key: &'static str) -> Result<String, ConfigError> {
    non_empty(source, key).ok_or(ConfigError::Missing(key))
}

fn number(source: &dyn ConfigSource, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match non_empty(source, key) {
        None => Ok(default),
        Some(value) => match value.parse() {
            Ok(parsed) => Ok(parsed),
            Err(err) => Err(ConfigError::Invalid {
                key,
                reason: format!("{err}"),
                value,
            }),
        },
    }
}

fn url_setting(
    source: &dyn ConfigSource,
    key: &'static str,
    default: &str,
) -> Result<Url, ConfigError> {
    let value = non_empty(source, key).unwrap_or_else(|| default.to_owned());
    Url::parse(&value).map_err(|err| ConfigError::Invalid {
        key,
        value,
        reason: err.to_string(),
    })
}
