#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use html_escape::encode_text;
use url::Url;
use watcher_core::error::Result;
use watcher_core::{
    CategoryRule, ConfigSource, Notifier, PageFetcher, RequestHeaders, WatchError, Watcher,
};

pub const ANGEBOTE: &str = "https://uhrforum.de/forums/angebote.11/";
pub const OTHER: &str = "https://uhrforum.de/forums/other.5/";

/// `(guid, title, category domain)` triples rendered as an RSS document.
pub fn rss(items: &[(&str, &str, &str)]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n<channel>\n\
         <title>Uhrforum</title>\n<link>https://uhrforum.de/</link>\n<description>Neue Beiträge</description>\n",
    );
    for (guid, title, domain) in items {
        body.push_str(&format!(
            "<item>\n<title>{title}</title>\n<link>https://uhrforum.de/threads/{guid}/</link>\n\
             <guid isPermaLink=\"false\">{guid}</guid>\n<category domain=\"{domain}\"> Angebote </category>\n</item>\n"
        ));
    }
    body.push_str("</channel>\n</rss>\n");
    body
}

/// The page a browser shows for a raw XML document.
pub fn browser_page(xml: &str) -> String {
    format!(
        "<html><head></head><body><pre style=\"word-wrap: break-word;\">{}</pre></body></html>",
        encode_text(xml)
    )
}

pub fn feed_url() -> Url {
    Url::parse("https://uhrforum.de/forums/-/index.rss").unwrap()
}

pub enum Scripted {
    Page(String),
    Fail,
    Panic,
}

/// Replays scripted pages; the last one repeats once the script runs out.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<Scripted>>,
    last_page: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last_page: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_rendered(&self, _url: &Url, _headers: &RequestHeaders) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Page(page)) => {
                *self.last_page.lock().unwrap() = Some(page.clone());
                Ok(page)
            }
            Some(Scripted::Fail) => Err(WatchError::Timeout(60)),
            Some(Scripted::Panic) => panic!("browser crashed"),
            None => self
                .last_page
                .lock()
                .unwrap()
                .clone()
                .ok_or(WatchError::EmptyContent),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Default::default()
        })
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn titled(&self, title: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(t, _)| t == title)
            .map(|(_, message)| message)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, title: &str, message: &str) -> Result<()> {
        if self.failing {
            return Err(WatchError::NotifyStatus {
                status: 500,
                body: "unavailable".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((title.to_owned(), message.to_owned()));
        Ok(())
    }
}

pub fn watcher(fetcher: Arc<ScriptedFetcher>, notifier: Arc<RecordingNotifier>) -> Watcher {
    Watcher::new(fetcher, notifier, feed_url(), CategoryRule::default())
}

/// Settings that tests can change while a watcher loop is running.
#[derive(Default)]
pub struct SharedSource(Mutex<HashMap<String, String>>);

impl SharedSource {
    pub fn with(pairs: &[(&str, &str)]) -> Arc<Self> {
        let source = Self::default();
        for (key, value) in pairs {
            source.set(key, value);
        }
        Arc::new(source)
    }

    pub fn set(&self, key: &str, value: &str) {
        self.0
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
    }
}

impl ConfigSource for SharedSource {
    fn get(&self, key: &str) -> Option<String> {
        self.0.lock().unwrap().get(key).cloned()
    }
}

pub fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
