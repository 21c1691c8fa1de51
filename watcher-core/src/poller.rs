use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{ConfigSource, LiveSettings};
use crate::error::{ParseError, Result, WatchError};
use crate::feed::{self, CategoryRule};
use crate::fetch::{PageFetcher, RequestHeaders};
use crate::gate::{self, SeenSet};
use crate::notify::Notifier;
use crate::page;
use crate::repair::repair;

/// State carried from one cycle to the next.
#[derive(Debug, Clone)]
pub struct RunState {
    /// True until the first feed has been parsed and its posts recorded.
    pub first_run: bool,
    /// Set once a missing-marker error was announced; cleared by the next
    /// successfully parsed feed.
    pub feed_broken: bool,
    pub seen: SeenSet,
    pub cycles: u64,
    pub last_success: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(seen_capacity: usize) -> Self {
        Self {
            first_run: true,
            feed_broken: false,
            seen: SeenSet::with_capacity(seen_capacity),
            cycles: 0,
            last_success: None,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            first_run: true,
            feed_broken: false,
            seen: SeenSet::default(),
            cycles: 0,
            last_success: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First successful cycle: posts recorded, nothing announced.
    Seeded { items: usize },
    Checked { matching: usize, notified: usize },
    Empty,
    AccessDenied,
    MissingMarker { notified: bool },
    Malformed,
    Failed,
}

/// Owns the pipeline and its state; one instance drives one feed.
pub struct Watcher {
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
    url: Url,
    headers: RequestHeaders,
    category: CategoryRule,
    state: RunState,
}

impl Watcher {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
        url: Url,
        category: CategoryRule,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            url,
            headers: RequestHeaders::default(),
            category,
            state: RunState::default(),
        }
    }

    pub fn with_headers(mut self, headers: RequestHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_state(mut self, state: RunState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub async fn announce_start(&self) {
        match self.notifier.send_startup().await {
            Ok(()) => info!("~ Uhrforum Watcher started ~"),
            Err(err) => warn!(error = %err, "failed to send startup notification"),
        }
    }

    /// Runs one fetch-to-notify pass. Failures are logged and reported in the
    /// outcome; they never escape.
    pub async fn run_cycle(&mut self, keywords: &[String]) -> CycleOutcome {
        self.state.cycles += 1;
        match self.check_feed(keywords).await {
            Ok(outcome) => outcome,
            Err(err) => self.handle_failure(err).await,
        }
    }

    async fn check_feed(&mut self, keywords: &[String]) -> Result<CycleOutcome> {
        let page = self.fetcher.fetch_rendered(&self.url, &self.headers).await?;
        let raw = page::extract_feed(&page)?;
        let items = feed::parse(&repair(&raw))?;

        self.state.feed_broken = false;
        let matching = self.category.apply(items);
        debug!(matching = matching.len(), "category items in feed");

        let first_run = self.state.first_run;
        let posts = gate::evaluate(&matching, &mut self.state.seen, keywords, first_run);
        self.state.last_success = Some(Utc::now());

        if first_run {
            self.state.first_run = false;
            info!(items = matching.len(), "recorded existing posts, watching for new ones");
            return Ok(CycleOutcome::Seeded {
                items: matching.len(),
            });
        }

        let mut notified = 0;
        for post in &posts {
            match self.notifier.send_new_post(post).await {
                Ok(()) => {
                    notified += 1;
                    info!("Notification sent for post: {}", post.title);
                }
                Err(err) => error!(title = %post.title, error = %err, "Failed to send notification"),
            }
        }

        Ok(CycleOutcome::Checked {
            matching: matching.len(),
            notified,
        })
    }

    async fn handle_failure(&mut self, err: WatchError) -> CycleOutcome {
        match err {
            WatchError::EmptyContent => {
                error!("No content found in the response.");
                CycleOutcome::Empty
            }
            WatchError::AccessDenied => {
                error!("Access denied or forbidden error detected!");
                CycleOutcome::AccessDenied
            }
            WatchError::MissingMarker => {
                let message = WatchError::MissingMarker.to_string();
                let notified = if self.state.feed_broken {
                    false
                } else {
                    self.state.feed_broken = true;
                    match self.notifier.send_error(&message).await {
                        Ok(()) => {
                            info!("Error notification sent");
                            true
                        }
                        Err(err) => {
                            error!(error = %err, "failed to send error notification");
                            false
                        }
                    }
                };
                error!("{}", message);
                CycleOutcome::MissingMarker { notified }
            }
            WatchError::MalformedXml(parse) => {
                log_parse_error(&parse);
                CycleOutcome::Malformed
            }
            other => {
                error!(error = %other, "Error during feed check");
                CycleOutcome::Failed
            }
        }
    }
}

fn log_parse_error(err: &ParseError) {
    match (err.line, err.column) {
        (Some(line), Some(column)) => {
            error!("XML Parse Error at line {}, column {}: {}", line, column, err.message);
            match &err.source_line {
                Some(source) => {
                    error!("{:4}: {}", line, source);
                    if let Some(caret) = err.caret() {
                        error!("{}", caret);
                    }
                }
                None => error!("Line number out of range."),
            }
        }
        _ => error!("XML Parse Error: {}", err),
    }
}

pub struct WatcherHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<Watcher>,
}

impl WatcherHandle {
    /// Stops the loop after the current cycle and hands the watcher back.
    pub async fn stop(self) -> Result<Watcher> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(WatchError::from)
    }
}

/// Runs cycles until stopped, re-reading the wait time and keyword filter
/// from `source` before every cycle.
pub fn spawn_watcher(mut watcher: Watcher, source: Arc<dyn ConfigSource>) -> WatcherHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        loop {
            info!("Checking for new posts...");
            let settings = LiveSettings::read(source.as_ref());

            let cycle = AssertUnwindSafe(watcher.run_cycle(&settings.keywords)).catch_unwind();
            match cycle.await {
                Ok(outcome) => debug!(?outcome, "cycle finished"),
                Err(_) => error!("Error during feed check: cycle panicked"),
            }

            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("watcher shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(settings.interval) => {}
            }
        }
        watcher
    });

    WatcherHandle { cancel_tx, join }
}
