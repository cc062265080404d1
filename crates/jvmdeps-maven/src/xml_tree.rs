//! Minimal owned XML tree for structural edits of `pom.xml` and
//! `settings.xml`.
//!
//! Whitespace-only text is dropped on parse and regenerated on write with
//! two-space indentation. The XML declaration, comments and attributes
//! survive a round trip.

use crate::error::{MavenError, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub declaration: Option<Declaration>,
    /// Comments before the root element.
    pub prolog: Vec<Node>,
    pub root: Element,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Element holding a single text child.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text.into()));
        element
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> {
        self.elements().filter(move |e| e.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Self> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Self> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Returns the first child called `name`, appending it when absent.
    pub fn ensure_child(&mut self, name: &str) -> &mut Self {
        let index = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name == name));
        let index = index.unwrap_or_else(|| {
            self.children.push(Node::Element(Self::new(name)));
            self.children.len() - 1
        });
        match &mut self.children[index] {
            Node::Element(e) => e,
            _ => unreachable!("index points at an element"),
        }
    }

    /// Concatenated, trimmed text content of this element.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).and_then(Self::text)
    }

    /// Replaces the text of child `name`, creating the child when needed.
    pub fn set_child_text(&mut self, name: &str, text: impl Into<String>) {
        let child = self.ensure_child(name);
        child.children = vec![Node::Text(text.into())];
    }

    pub fn push(&mut self, element: Self) {
        self.children.push(Node::Element(element));
    }

    /// Removes child elements matching `predicate`; returns how many were
    /// removed.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Self) -> bool) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if predicate(e)));
        before - self.children.len()
    }
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            declaration: Some(Declaration {
                version: "1.0".into(),
                encoding: Some("UTF-8".into()),
                standalone: None,
            }),
            prolog: Vec::new(),
            root,
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);
        let mut declaration = None;
        let mut prolog = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let pos = reader.buffer_position();
            let event = reader.read_event().map_err(|e| MavenError::xml(e, pos))?;
            match event {
                Event::Decl(ref d) => {
                    declaration = Some(Declaration {
                        version: d
                            .version()
                            .map(|v| String::from_utf8_lossy(&v).into_owned())
                            .unwrap_or_else(|_| "1.0".into()),
                        encoding: d
                            .encoding()
                            .and_then(|r| r.ok())
                            .map(|v| String::from_utf8_lossy(&v).into_owned()),
                        standalone: d
                            .standalone()
                            .and_then(|r| r.ok())
                            .map(|v| String::from_utf8_lossy(&v).into_owned()),
                    });
                }
                Event::Start(ref e) => stack.push(start_element(e, pos)?),
                Event::Empty(ref e) => {
                    let element = start_element(e, pos)?;
                    attach(&mut stack, &mut root, element, pos)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| MavenError::xml("unexpected closing tag", pos))?;
                    attach(&mut stack, &mut root, element, pos)?;
                }
                Event::Text(ref e) => {
                    let raw = e
                        .decode()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(e.as_ref()).into_owned());
                    let text = quick_xml::escape::unescape(&raw)
                        .map(|c| c.into_owned())
                        .unwrap_or(raw);
                    push_text(&mut stack, text);
                }
                Event::GeneralRef(ref r) => {
                    let raw = format!("&{};", String::from_utf8_lossy(r.as_ref()));
                    let text = quick_xml::escape::unescape(&raw)
                        .map(|c| c.into_owned())
                        .unwrap_or(raw);
                    push_text(&mut stack, text);
                }
                Event::CData(ref e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent
                            .children
                            .push(Node::CData(String::from_utf8_lossy(e.as_ref()).into_owned()));
                    }
                }
                Event::Comment(ref e) => {
                    let comment = String::from_utf8_lossy(e.as_ref()).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Comment(comment)),
                        None if root.is_none() => prolog.push(Node::Comment(comment)),
                        None => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(MavenError::xml(
                format!("unclosed <{}> element", open.name),
                reader.buffer_position(),
            ));
        }
        let root = root.ok_or_else(|| MavenError::xml("document has no root element", 0))?;
        Ok(Self {
            declaration,
            prolog,
            root,
        })
    }

    /// Serializes with two-space indentation and a trailing newline.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        if let Some(decl) = &self.declaration {
            writer.write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))?;
        }
        for node in &self.prolog {
            write_node(&mut writer, node)?;
        }
        write_element(&mut writer, &self.root)?;

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| MavenError::xml(e, 0))?;
        xml.push('\n');
        Ok(xml)
    }
}

fn start_element(e: &BytesStart<'_>, pos: u64) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr.map_err(|err| MavenError::xml(err, pos))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| MavenError::xml(err, pos))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    pos: u64,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(MavenError::xml("multiple root elements", pos)),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: String) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(existing)) = parent.children.last_mut() {
        existing.push_str(&text);
    } else if !text.trim().is_empty() {
        parent.children.push(Node::Text(text));
    }
}

fn write_node<W: std::io::Write>(writer: &mut Writer<W>, node: &Node) -> std::io::Result<()> {
    match node {
        Node::Element(e) => write_element(writer, e),
        Node::Text(t) => {
            let trimmed = t.trim();
            if trimmed.is_empty() {
                Ok(())
            } else {
                writer.write_event(Event::Text(BytesText::new(trimmed)))
            }
        }
        Node::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str()))),
        Node::Comment(c) => writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str()))),
    }
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &Element,
) -> std::io::Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let has_content = element.children.iter().any(|n| match n {
        Node::Text(t) => !t.trim().is_empty(),
        _ => true,
    });
    if !has_content {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))
}
