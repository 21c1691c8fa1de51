//! Minimal XML document model.
//!
//! Elements carry their leading `text` and the `tail` that follows their
//! closing tag, the same shape ElementTree uses, so the repair pass can walk
//! every text node and write the tree back out.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ParseError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
    pub tail: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child named `name`.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Serializes the element and its subtree. Text and tail content of every
    /// node are escaped; the element's own tail is not written.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + 64);
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", key, encode_double_quoted_attribute(value));
        }
        if self.text.is_empty() && self.children.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        out.push_str(&encode_text(&self.text));
        for child in &self.children {
            child.write_into(out);
            out.push_str(&encode_text(&child.tail));
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    fn push_text(&mut self, text: &str) {
        match self.children.last_mut() {
            Some(last) => last.tail.push_str(text),
            None => self.text.push_str(text),
        }
    }
}

pub fn is_well_formed(text: &str) -> bool {
    parse_document(text).is_ok()
}

/// Parses `text` into its root element, rejecting anything a strict XML 1.0
/// parser would: mismatched or unclosed tags, undefined entities, content
/// outside the root element and multiple roots.
pub fn parse_document(text: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event_start = reader.buffer_position() as usize;
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                let pos = reader.buffer_position() as usize;
                return Err(ParseError::new(err.to_string()).at(text, pos));
            }
        };

        match event {
            Event::Start(start) => {
                if root.is_some() && stack.is_empty() {
                    let err = ParseError::new("junk after document element");
                    return Err(err.at(text, event_start));
                }
                stack.push(open_element(&start).map_err(|err| err.at(text, event_start))?);
            }
            Event::Empty(start) => {
                let element = open_element(&start).map_err(|err| err.at(text, event_start))?;
                attach(&mut stack, &mut root, element).map_err(|err| err.at(text, event_start))?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    ParseError::new("unmatched closing tag").at(text, event_start)
                })?;
                attach(&mut stack, &mut root, element).map_err(|err| err.at(text, event_start))?;
            }
            Event::Text(content) => {
                let unescaped = content
                    .unescape()
                    .map_err(|err| ParseError::new(err.to_string()).at(text, event_start))?;
                match stack.last_mut() {
                    Some(top) => top.push_text(&unescaped),
                    None if unescaped.trim().is_empty() => {}
                    None => {
                        let err = ParseError::new("text outside the document element");
                        return Err(err.at(text, event_start));
                    }
                }
            }
            Event::CData(content) => {
                let content = String::from_utf8_lossy(&content).into_owned();
                match stack.last_mut() {
                    Some(top) => top.push_text(&content),
                    None => {
                        let err = ParseError::new("CDATA outside the document element");
                        return Err(err.at(text, event_start));
                    }
                }
            }
            Event::Eof => break,
            // declarations, comments, processing instructions and doctypes
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ParseError::new("unclosed token").at(text, text.len()));
    }
    root.ok_or_else(|| ParseError::new("no element found").at(text, text.len()))
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, ParseError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|err| ParseError::new(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| ParseError::new(err.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), ParseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(ParseError::new("junk after document element"));
    }
    *root = Some(element);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_text_tail_and_attributes() {
        let root = parse_document(
            r#"<?xml version="1.0"?><a x="1 &amp; 2">one<b/>two<c>three</c></a>"#,
        )
        .unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.attribute("x"), Some("1 & 2"));
        assert_eq!(root.text, "one");
        assert_eq!(root.children[0].tail, "two");
        assert_eq!(root.find("c").map(|c| c.text.as_str()), Some("three"));
    }

    #[test]
    fn predefined_and_numeric_references_are_decoded() {
        let root = parse_document("<a>&lt;&amp;&#169;&#x2014;</a>").unwrap();
        assert_eq!(root.text, "<&\u{a9}\u{2014}");
    }

    #[test]
    fn rejects_what_a_strict_parser_rejects() {
        for bad in [
            "",
            "<a><b></a>",
            "<a><b></b>",
            "<a/><b/>",
            "<a/>junk",
            "<a>x & y</a>",
            "<a>x&nbsp;y</a>",
        ] {
            assert!(!is_well_formed(bad), "{bad:?} should not parse");
        }
    }

    #[test]
    fn error_points_at_the_offending_line() {
        let err = parse_document("<rss>\n  <title>A & B</title>\n</rss>").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert_eq!(err.column, Some(10));
        assert_eq!(err.source_line.as_deref(), Some("  <title>A & B</title>"));
    }

    #[test]
    fn serializer_escapes_text_and_tail() {
        let mut root = Element::new("a");
        root.text = "x > y".into();
        let mut child = Element::new("b");
        child.tail = "1 & 2".into();
        root.children.push(child);
        assert_eq!(root.to_xml_string(), "<a>x &gt; y<b />1 &amp; 2</a>");
    }
}
