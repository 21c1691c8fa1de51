use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::xml;

static RE_AMPERSAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(#?\w+;)?").unwrap());

/// Best-effort fix-up of feed text that does not parse as XML.
///
/// Valid input comes back untouched. Otherwise bare ampersands are escaped;
/// if that makes the document parse, the tree is written back out with every
/// text node escaped once more. If it still does not parse, the
/// ampersand-escaped text is returned so the caller's parse reports the
/// remaining problem.
pub fn repair(raw: &str) -> String {
    if xml::is_well_formed(raw) {
        return raw.to_owned();
    }

    let cleaned = escape_bare_ampersands(raw);
    match xml::parse_document(&cleaned) {
        Ok(root) => {
            debug!("feed XML repaired by escaping ampersands");
            root.to_xml_string()
        }
        Err(err) => {
            debug!(error = %err, "ampersand escaping did not repair feed XML");
            cleaned.into_owned()
        }
    }
}

/// Replaces every `&` that does not start an entity or character reference
/// (`&name;`, `&#123;`, `&#x1f;`) with `&amp;`.
pub fn escape_bare_ampersands(text: &str) -> Cow<'_, str> {
    RE_AMPERSAND.replace_all(text, |caps: &Captures<'_>| match caps.get(1) {
        Some(reference) => format!("&{}", reference.as_str()),
        None => "&amp;".to_owned(),
    })
}
