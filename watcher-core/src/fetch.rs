use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use html_escape::encode_text;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use reqwest::Client;
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, WatchError};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://uhrforum.de/";
pub const DEFAULT_PLATFORM: &str = "macOS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    pub user_agent: String,
    pub referer: String,
    pub platform: String,
}

impl Default for RequestHeaders {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            referer: DEFAULT_REFERER.to_owned(),
            platform: DEFAULT_PLATFORM.to_owned(),
        }
    }
}

impl RequestHeaders {
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        let entries = [
            (USER_AGENT, &self.user_agent),
            (REFERER, &self.referer),
            (HeaderName::from_static("sec-ch-ua-platform"), &self.platform),
        ];
        for (name, value) in entries {
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    map.insert(name, value);
                }
                Err(err) => warn!(header = %name, error = %err, "dropping invalid header value"),
            }
        }
        map
    }
}

/// Retrieves a page as a browser would render it.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_rendered(&self, url: &Url, headers: &RequestHeaders) -> Result<String>;
}

/// Renders pages with a headless Chrome/Chromium and returns the dumped DOM.
#[derive(Debug, Clone)]
pub struct ChromeFetcher {
    binary: PathBuf,
    timeout: Duration,
}

impl ChromeFetcher {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self, url: &Url, headers: &RequestHeaders) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--window-size=1920,1080")
            .arg(format!("--user-agent={}", headers.user_agent))
            .arg("--dump-dom")
            .arg(url.as_str())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl PageFetcher for ChromeFetcher {
    async fn fetch_rendered(&self, url: &Url, headers: &RequestHeaders) -> Result<String> {
        debug!(%url, binary = %self.binary.display(), "rendering page with headless browser");
        let mut command = self.command(url, headers);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| WatchError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(WatchError::BrowserExit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Plain HTTP fetch for sources that need no client-side rendering.
///
/// Non-HTML bodies are wrapped in a `<pre>` block the way a browser shows a
/// raw document, so callers see the same page shape from either fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_rendered(&self, url: &Url, headers: &RequestHeaders) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .headers(headers.to_header_map())
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%url, %status, bytes = body.len(), "fetched page");
        Ok(render_like_browser(&body))
    }
}

fn render_like_browser(body: &str) -> String {
    let head = body.trim_start().get(..64).unwrap_or(body.trim_start()).to_ascii_lowercase();
    if body.trim().is_empty() || head.starts_with("<!doctype html") || head.starts_with("<html") {
        return body.to_owned();
    }
    format!(
        "<html><head></head><body><pre>{}</pre></body></html>",
        encode_text(body)
    )
}
