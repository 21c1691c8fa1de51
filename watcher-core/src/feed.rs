use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ParseError;
use crate::xml;

pub const DEFAULT_CATEGORY_DOMAIN: &str = "https://uhrforum.de/forums/angebote.11/";
pub const DEFAULT_CATEGORY_LABEL: &str = "Angebote";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Category {
    pub domain: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub guid: String,
    pub categories: Vec<Category>,
}

impl FeedItem {
    /// Builds an item from an RSS entry, or `None` when the title, link or
    /// guid is missing.
    pub fn from_rss_item(item: &rss::Item) -> Option<Self> {
        let title = non_blank(item.title())?;
        let link = non_blank(item.link())?;
        let guid = non_blank(item.guid().map(|guid| guid.value()))?;

        let categories = item
            .categories()
            .iter()
            .map(|cat| Category {
                domain: cat.domain().unwrap_or_default().to_owned(),
                label: cat.name().trim().to_owned(),
            })
            .collect();

        Some(Self {
            title: title.to_owned(),
            link: link.to_owned(),
            guid: guid.to_owned(),
            categories,
        })
    }

    pub fn has_category(&self, domain: &str, label: &str) -> bool {
        self.categories
            .iter()
            .any(|cat| cat.domain == domain && cat.label == label)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// The category pair a watcher is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub domain: String,
    pub label: String,
}

impl Default for CategoryRule {
    fn default() -> Self {
        Self {
            domain: DEFAULT_CATEGORY_DOMAIN.to_owned(),
            label: DEFAULT_CATEGORY_LABEL.to_owned(),
        }
    }
}

impl CategoryRule {
    pub fn apply(&self, items: Vec<FeedItem>) -> Vec<FeedItem> {
        filter_by_category(items, &self.domain, &self.label)
    }
}

/// Parses the channel items of an RSS document.
///
/// Items lacking a title, link or guid are skipped with a warning instead of
/// failing the whole feed.
pub fn parse(xml_text: &str) -> Result<Vec<FeedItem>, ParseError> {
    let root = xml::parse_document(xml_text)?;
    let has_channel = root.name == "channel" || root.find("channel").is_some();
    if !has_channel {
        return Err(ParseError::new(format!(
            "no channel element under <{}>",
            root.name
        )));
    }

    let channel = rss::Channel::read_from(xml_text.as_bytes())
        .map_err(|err| ParseError::new(err.to_string()))?;

    let mut items = Vec::with_capacity(channel.items().len());
    for (index, item) in channel.items().iter().enumerate() {
        match FeedItem::from_rss_item(item) {
            Some(parsed) => items.push(parsed),
            None => warn!(
                index,
                title = item.title().unwrap_or_default(),
                "skipping feed item without title, link or guid"
            ),
        }
    }

    debug!(items = items.len(), "parsed feed");
    Ok(items)
}

/// Keeps the items tagged with the given category, in feed order.
pub fn filter_by_category(items: Vec<FeedItem>, domain: &str, label: &str) -> Vec<FeedItem> {
    items
        .into_iter()
        .filter(|item| item.has_category(domain, label))
        .collect()
}
