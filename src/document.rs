//! Minimal XML element tree used to merge descriptors and write manifests.
//!
//! Parsing keeps elements, attributes, text, CDATA and comments in order.
//! Whitespace-only text between child elements is dropped so that output
//! can be re-indented consistently.

use std::path::Path;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::error::PackageError;
use crate::files::read_file;

/// Indentation used for every generated document
const INDENT: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Error while parsing XML: {0}")]
    Parse(String),

    #[error("Document has no root element")]
    NoRoot,

    #[error("Document has more than one root element")]
    MultipleRoots,

    #[error("Text outside the root element")]
    TextOutsideRoot,

    #[error("Error while writing XML: {0}")]
    Write(String),
}

/// Content of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written (`prefix:local` or `local`)
    pub name: String,
    /// Attributes in document order, values unescaped
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Element holding a single text node (`<name>Foo</name>`)
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text.into()));
        element
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(idx).1)
    }

    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Child elements, skipping text and comments
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Concatenated text and CDATA content of this element
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn has_element_children(&self) -> bool {
        self.children.iter().any(|n| matches!(n, Node::Element(_)))
    }

    fn drop_formatting_whitespace(&mut self) {
        if self.has_element_children() {
            self.children
                .retain(|n| !matches!(n, Node::Text(t) if t.trim().is_empty()));
        }
    }
}

/// A parsed XML document with a single root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse a document from raw bytes
    pub fn parse(input: &[u8]) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_reader(input);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| DocumentError::Parse(e.to_string()))?;
            match event {
                Event::Start(e) => stack.push(element_from(&e)?),
                Event::Empty(e) => {
                    let element = element_from(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let Some(mut element) = stack.pop() else {
                        return Err(DocumentError::Parse("unexpected end tag".to_string()));
                    };
                    element.drop_formatting_whitespace();
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| DocumentError::Parse(e.to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Text(text.into_owned())),
                        None if text.trim().is_empty() => {}
                        None => return Err(DocumentError::TextOutsideRoot),
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::CData(text)),
                        None => return Err(DocumentError::TextOutsideRoot),
                    }
                }
                Event::Comment(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e).into_owned();
                        parent.children.push(Node::Comment(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(DocumentError::Parse("unclosed element".to_string()));
        }
        root.map(Self::new).ok_or(DocumentError::NoRoot)
    }

    /// Read and parse a document from disk
    pub fn read(path: &Path) -> Result<Self, PackageError> {
        let bytes = read_file(path)?;
        Self::parse(&bytes).map_err(|source| PackageError::Document {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serialize with an XML declaration and 4-space indentation
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;
        write_element(&mut writer, &self.root)?;
        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn write_error(e: impl std::fmt::Display) -> DocumentError {
    DocumentError::Write(e.to_string())
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, DocumentError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocumentError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| DocumentError::Parse(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(element);
            Ok(())
        }
        None if root.is_some() => Err(DocumentError::MultipleRoots),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(write_error)?,
            Node::CData(t) => writer
                .write_event(Event::CData(BytesCData::new(t.as_str())))
                .map_err(write_error)?,
            Node::Comment(t) => writer
                .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                .map_err(write_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<CustomField xmlns="http://soap.sforce.com/2006/04/metadata">
    <fullName>Score__c</fullName>
    <label>Score &amp; Rank</label>
    <type>Number</type>
</CustomField>
"#;

    #[test]
    fn test_parse_elements_and_text() {
        let doc = Document::parse(FIELD.as_bytes()).unwrap();
        assert_eq!(doc.root.name, "CustomField");
        assert_eq!(
            doc.root.attribute("xmlns"),
            Some("http://soap.sforce.com/2006/04/metadata")
        );
        let names: Vec<_> = doc.root.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["fullName", "label", "type"]);
        let label = doc.root.elements().nth(1).unwrap();
        assert_eq!(label.text(), "Score & Rank");
    }

    #[test]
    fn test_parse_drops_formatting_whitespace() {
        let doc = Document::parse(FIELD.as_bytes()).unwrap();
        assert!(doc.root.children.iter().all(|n| matches!(n, Node::Element(_))));
    }

    #[test]
    fn test_parse_keeps_cdata_and_comments() {
        let xml = b"<?xml version=\"1.0\"?><a><!-- note --><b><![CDATA[x < y]]></b></a>";
        let doc = Document::parse(xml).unwrap();
        assert!(matches!(&doc.root.children[0], Node::Comment(c) if c == " note "));
        assert_eq!(doc.root.elements().next().unwrap().text(), "x < y");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Document::parse(b"").unwrap_err(), DocumentError::NoRoot);
        assert_eq!(
            Document::parse(b"<a/><b/>").unwrap_err(),
            DocumentError::MultipleRoots
        );
        assert_eq!(
            Document::parse(b"junk<a/>").unwrap_err(),
            DocumentError::TextOutsideRoot
        );
        assert!(matches!(
            Document::parse(b"<a><b></a>"),
            Err(DocumentError::Parse(_))
        ));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(Element::new("md:fields").local_name(), "fields");
        assert_eq!(Element::new("fields").local_name(), "fields");
    }

    #[test]
    fn test_attribute_editing() {
        let mut e = Element::new("a").with_attribute("xmlns", "urn:one");
        e.set_attribute("xmlns", "urn:two");
        e.set_attribute("xmlns:xsi", "urn:xsi");
        assert_eq!(e.attribute("xmlns"), Some("urn:two"));
        assert_eq!(e.attributes.len(), 2);
        assert_eq!(e.remove_attribute("xmlns").as_deref(), Some("urn:two"));
        assert_eq!(e.remove_attribute("xmlns"), None);
    }

    #[test]
    fn test_to_bytes_indents_and_escapes() {
        let mut root = Element::new("Package").with_attribute("xmlns", "urn:x");
        let mut types = Element::new("types");
        types.push(Element::with_text("members", "A&B"));
        types.push(Element::with_text("name", "ApexClass"));
        root.push(types);
        root.push(Element::new("empty"));

        let out = String::from_utf8(Document::new(root).to_bytes().unwrap()).unwrap();
        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<Package xmlns="urn:x">
    <types>
        <members>A&amp;B</members>
        <name>ApexClass</name>
    </types>
    <empty/>
</Package>
"#;
        assert_eq!(out, expected);
    }

    #[test]
    fn test_reparse_of_written_document_is_equal() {
        let doc = Document::parse(FIELD.as_bytes()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        assert_eq!(Document::parse(&bytes).unwrap(), doc);
    }
}
