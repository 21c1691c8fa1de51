//! Extraction of the raw feed from the page the browser rendered.
//!
//! Browsers show an XML document as a `<pre>` block holding the escaped
//! source, so the feed is the entity-decoded text of that block.

use html_escape::decode_html_entities;
use scraper::{Html, Selector};

use crate::error::{Result, WatchError};

const DENIAL_MARKERS: [&str; 2] = ["403 Forbidden", "not authorized"];

/// Pulls the feed text out of a rendered page, classifying the pages that
/// carry no feed.
pub fn extract_feed(page: &str) -> Result<String> {
    if page.is_empty() {
        return Err(WatchError::EmptyContent);
    }
    if DENIAL_MARKERS.iter().any(|marker| page.contains(marker)) {
        return Err(WatchError::AccessDenied);
    }

    let document = Html::parse_document(page);
    let selector = Selector::parse("pre").map_err(|_| WatchError::MissingMarker)?;
    let pre = document
        .select(&selector)
        .next()
        .ok_or(WatchError::MissingMarker)?;

    // The parser already decoded one level of entities; the block itself can
    // carry a second, escaped one.
    let escaped: String = pre.text().collect();
    Ok(decode_html_entities(&escaped).into_owned())
}
