//! OVF document reading.
//!
//! Descriptors exported by different tools disagree on the capitalization of
//! element and attribute names (`ovf:diskId` vs `ovf:diskid`), so the tree built
//! here stores every qualified name in ASCII lowercase and all lookups compare
//! names case-insensitively. Namespace prefixes are kept as written, so callers
//! look up `rasd:caption` rather than a resolved namespace URI.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A child element.
    Element(Element),
    /// Character data (text or CDATA), already unescaped.
    Text(String),
}

/// An XML element with lowercased name and attribute keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::xml_parse(format!("in <{}>: {}", name, e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::xml_parse(format!("in <{}> attribute '{}': {}", name, key, e)))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    /// The lowercased qualified name, e.g. `rasd:caption`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check whether this element has the given name, ignoring case.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Look up an attribute value by qualified name, ignoring case.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Direct child elements, skipping text nodes.
    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Find the first descendant with the given name, in document order.
    ///
    /// The element itself is not considered.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in self.children() {
            if child.is(name) {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Find every descendant with the given name, in document order.
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in self.children() {
            if child.is(name) {
                found.push(child);
            }
            child.collect_named(name, found);
        }
    }

    /// Text content of this element and all its descendants, trimmed.
    pub fn text(&self) -> String {
        let mut text = String::new();
        self.collect_text(&mut text);
        text.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(element) => element.collect_text(out),
            }
        }
    }
}

/// A parsed, immutable descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    /// Read and parse a descriptor from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `path` does not exist, [`Error::Io`] if it
    /// cannot be read, and [`Error::XmlParse`] if the content is not well-formed.
    pub fn open(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::not_found(path),
            _ => Error::io(e, path),
        })?;
        Self::parse_str(&content)
    }

    /// Parse a descriptor from a string.
    pub fn parse_str(xml: &str) -> Result<Self> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
        let mut reader = Reader::from_str(xml);
        // Whitespace between mixed-content pieces is significant; only the
        // joined text is trimmed, in `Element::text`.
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(Element::from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let element = Element::from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(ref e)) => {
                    let element = stack.pop().ok_or_else(|| {
                        Error::xml_parse(format!(
                            "unexpected closing tag </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        ))
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::xml_parse(e.to_string()))?
                        .into_owned();
                    push_text(&mut stack, text)?;
                }
                Ok(Event::CData(ref c)) => {
                    let text = String::from_utf8_lossy(c).into_owned();
                    push_text(&mut stack, text)?;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::xml_parse(format!(
                        "at byte {}: {}",
                        reader.error_position(),
                        e
                    )))
                }
                // Declarations, comments, processing instructions, doctypes
                Ok(_) => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::xml_parse(format!(
                "unclosed element <{}> at end of document",
                open.name
            )));
        }

        let root = root.ok_or_else(|| Error::xml_parse("document has no root element"))?;
        Ok(Self { root })
    }

    /// The document element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Find the first element with the given name anywhere in the document,
    /// including the root.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.root.is(name) {
            Some(&self.root)
        } else {
            self.root.find(name)
        }
    }

    /// Find every element with the given name anywhere in the document.
    pub fn find_all(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        if self.root.is(name) {
            found.push(&self.root);
        }
        found.extend(self.root.find_all(name));
        found
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(Error::xml_parse(format!(
            "multiple root elements (second is <{}>)",
            element.name
        ))),
    }
}

fn push_text(stack: &mut [Element], text: String) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Text(text));
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::xml_parse("text outside of the root element")),
    }
}
