//! Namespace-free element tree built from quick-xml events.
//!
//! Element names keep only their local part, so `cbc:IssueDate` and
//! `IssueDate` are looked up the same way.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::ExtractionError;

/// A parsed XML element with its text content and children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element, ExtractionError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();

        loop {
            let event = reader
                .read_event()
                .map_err(|e| malformed(reader.buffer_position(), e))?;

            match event {
                Event::Start(start) => {
                    stack.push(Element::new(local_name(start.local_name().as_ref())));
                }
                Event::Empty(start) => {
                    let element = Element::new(local_name(start.local_name().as_ref()));
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        ExtractionError::NoStructuredData("unbalanced end tag".to_string())
                    })?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| malformed(reader.buffer_position(), e))?;
                    // Text after the first child is tail text, not element text.
                    if let Some(current) = stack.last_mut().filter(|e| e.children.is_empty()) {
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut().filter(|e| e.children.is_empty()) {
                        current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => {
                    return Err(ExtractionError::NoStructuredData(
                        "document has no complete root element".to_string(),
                    ));
                }
                _ => {}
            }
        }
    }

    /// Find the first element matching an ElementTree-style path.
    ///
    /// Supports `./A/B` (children of this element) and `.//A/B` (any
    /// descendant `A` followed by a child chain).
    pub fn find(&self, path: &str) -> Option<&Element> {
        let (descendant, rest) = match path.strip_prefix(".//") {
            Some(rest) => (true, rest),
            None => (false, path.strip_prefix("./").unwrap_or(path)),
        };
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let (first, tail) = segments.split_first()?;

        if descendant {
            self.descendants()
                .into_iter()
                .filter(|e| e.name == *first)
                .find_map(|e| e.follow(tail))
        } else {
            self.children
                .iter()
                .filter(|e| e.name == *first)
                .find_map(|e| e.follow(tail))
        }
    }

    /// Trimmed text of the first element matching `path`, if non-empty.
    pub fn find_text(&self, path: &str) -> Option<String> {
        self.find(path)
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    fn follow(&self, segments: &[&str]) -> Option<&Element> {
        match segments.split_first() {
            None => Some(self),
            Some((name, rest)) => self
                .children
                .iter()
                .filter(|c| c.name == *name)
                .find_map(|c| c.follow(rest)),
        }
    }

    /// All descendants in document order, excluding `self`.
    fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(element) = stack.pop() {
            out.push(element);
            stack.extend(element.children.iter().rev());
        }
        out
    }
}

fn local_name(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn malformed(position: impl std::fmt::Display, err: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::NoStructuredData(format!("malformed XML at byte {}: {}", position, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_namespace_prefixes() {
        let root = Element::parse(
            r#"<?xml version="1.0"?>
            <fe:Invoice xmlns:fe="urn:x" xmlns:cbc="urn:y">
                <cbc:ID>FE-1</cbc:ID>
                <cac:Note xmlns:cac="urn:z"/>
            </fe:Invoice>"#,
        )
        .unwrap();

        assert_eq!(root.name, "Invoice");
        assert_eq!(root.find_text("./ID").as_deref(), Some("FE-1"));
        assert!(root.find("./Note").is_some());
    }

    #[test]
    fn test_descendant_path_takes_first_full_match() {
        let root = Element::parse(
            "<R><A><C>no</C></A><X><A><B>yes</B></A></X><A><B>later</B></A></R>",
        )
        .unwrap();

        assert_eq!(root.find_text(".//A/B").as_deref(), Some("yes"));
        assert_eq!(root.find_text("./A/B").as_deref(), Some("later"));
        assert_eq!(root.find_text(".//Missing"), None);
    }

    #[test]
    fn test_escaped_and_cdata_text() {
        let root = Element::parse(
            "<R><E>&lt;Inner&gt;1&lt;/Inner&gt;</E><C><![CDATA[<Inner>2</Inner>]]></C></R>",
        )
        .unwrap();

        assert_eq!(root.find_text("./E").as_deref(), Some("<Inner>1</Inner>"));
        assert_eq!(root.find_text("./C").as_deref(), Some("<Inner>2</Inner>"));
    }

    #[test]
    fn test_mixed_content_keeps_leading_text_only() {
        let root = Element::parse("<R><M>head<X>inner</X>tail<![CDATA[more]]></M></R>").unwrap();

        assert_eq!(root.find_text("./M").as_deref(), Some("head"));
        assert_eq!(root.find_text("./M/X").as_deref(), Some("inner"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(Element::parse("<R><A></R>").is_err());
        assert!(Element::parse("<R><A>").is_err());
        assert!(Element::parse("not xml at all").is_err());
    }
}
