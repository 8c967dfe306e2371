//! Small owned XML tree for inputs that arrive whole, such as harvested
//! update batches.

use std::io::BufRead;

use quick_xml::events::BytesStart;

use crate::error::{Result, SourceError};
use crate::parser::cursor::{local_name, Token, XmlCursor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its attributes and children. Names are local names
/// (namespace prefixes dropped); attribute keys keep their prefix (`xml:lang`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn parse_str(xml: &str) -> Result<Self> {
        Self::parse_reader(xml.as_bytes())
    }

    /// Read a whole document and return its root element.
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut cursor = XmlCursor::new(reader);
        loop {
            match cursor.next_token()? {
                Token::Start(e) => return build(&mut cursor, &e),
                Token::Empty(e) => return from_start(&e),
                Token::Eof => return Err(SourceError::UnexpectedEof("document".to_string())),
                Token::End | Token::Text(_) => {}
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children().find(|e| e.name == name)
    }

    /// Text of the first child called `name`, trimmed.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).map(|e| e.text().trim().to_string())
    }

    /// All descendants called `name`, in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        collect_named(self, name, &mut found);
        found
    }

    /// Concatenated text of this element and everything below it.
    pub fn text(&self) -> String {
        let mut out = String::new();
        push_text(self, &mut out);
        out
    }
}

fn collect_named<'a>(element: &'a Element, name: &str, found: &mut Vec<&'a Element>) {
    for child in element.children() {
        if child.name == name {
            found.push(child);
        }
        collect_named(child, name, found);
    }
}

fn push_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => push_text(e, out),
        }
    }
}

fn from_start(start: &BytesStart) -> Result<Element> {
    let mut element = Element::new(local_name(start));
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn build<R: BufRead>(cursor: &mut XmlCursor<R>, start: &BytesStart) -> Result<Element> {
    let mut element = from_start(start)?;
    loop {
        match cursor.next_token()? {
            Token::Start(e) => element.children.push(Node::Element(build(cursor, &e)?)),
            Token::Empty(e) => element.children.push(Node::Element(from_start(&e)?)),
            Token::Text(t) => element.children.push(Node::Text(t)),
            Token::End => return Ok(element),
            Token::Eof => return Err(SourceError::UnexpectedEof(element.name)),
        }
    }
}
