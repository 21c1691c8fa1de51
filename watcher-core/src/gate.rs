use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::feed::FeedItem;

pub const DEFAULT_SEEN_CAPACITY: usize = 10_000;

/// A post that passed dedup and the keyword filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub link: String,
}

/// Guids already processed during this process's lifetime.
///
/// Bounded: once `capacity` guids are held, inserting evicts the oldest one.
#[derive(Debug, Clone)]
pub struct SeenSet {
    guids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SEEN_CAPACITY)
    }
}

impl SeenSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            guids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.guids.contains(guid)
    }

    /// Returns `true` if the guid was not present before.
    pub fn insert(&mut self, guid: &str) -> bool {
        if self.guids.contains(guid) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.guids.remove(&evicted);
                debug!(guid = %evicted, "evicted oldest seen guid");
            }
        }
        self.guids.insert(guid.to_owned());
        self.order.push_back(guid.to_owned());
        true
    }

    pub fn len(&self) -> usize {
        self.guids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Splits a comma-separated allow-list into trimmed, lowercase keywords.
/// Empty entries are dropped.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

pub fn matches_keywords(title: &str, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let title = title.to_lowercase();
    keywords.iter().any(|keyword| title.contains(keyword.as_str()))
}

/// Decides which items to announce and records every item as seen.
///
/// On the first run every guid is recorded and nothing is announced. Later
/// runs announce unseen items whose title matches `keywords` (all unseen
/// items when `keywords` is empty), in feed order. Unseen items are recorded
/// whether or not they matched.
pub fn evaluate(
    items: &[FeedItem],
    seen: &mut SeenSet,
    keywords: &[String],
    first_run: bool,
) -> Vec<Notification> {
    if first_run {
        for item in items {
            seen.insert(&item.guid);
        }
        return Vec::new();
    }

    let mut notifications = Vec::new();
    for item in items {
        if !seen.insert(&item.guid) {
            continue;
        }
        if matches_keywords(&item.title, keywords) {
            notifications.push(Notification {
                title: item.title.clone(),
                link: item.link.clone(),
            });
        } else {
            debug!(guid = %item.guid, title = %item.title, "new post filtered out by keywords");
        }
    }
    notifications
}
