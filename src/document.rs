//! Markup reader producing a normalized element tree.
//!
//! Every child collection is stored as a sequence, whether the source held
//! one occurrence of a tag or many, so callers never have to distinguish the
//! two shapes. Attributes live in their own map, apart from child elements.

use crate::error::{FlowError, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: BTreeMap<String, String>,
    text: Option<String>,
    children: BTreeMap<String, Vec<Element>>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Trimmed text content, `None` when the element holds no text.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// All children with the given tag, in document order. Absent tags yield
    /// an empty slice.
    pub fn children(&self, name: &str) -> &[Element] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children(name).first()
    }

    /// Text of the first child with the given tag, skipping blank values.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .and_then(Element::text)
            .filter(|text| !text.is_empty())
    }

    /// Number of elements in this subtree, including `self`.
    pub fn element_count(&self) -> usize {
        1 + self
            .children
            .values()
            .flatten()
            .map(Element::element_count)
            .sum::<usize>()
    }

    fn push_child(&mut self, child: Element) {
        self.children
            .entry(child.name.clone())
            .or_default()
            .push(child);
    }

    /// Raw chunks are kept as-is until the element closes, so whitespace
    /// around comments and CDATA sections survives.
    fn append_text(&mut self, chunk: &str) {
        match &mut self.text {
            Some(text) => text.push_str(chunk),
            None => self.text = Some(chunk.to_string()),
        }
    }

    fn finish_text(&mut self) {
        self.text = self
            .text
            .take()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
    }

    /// JSON rendition of the subtree. Attributes appear under `@_<name>`,
    /// text under `#text`, and each child tag maps to an array. A bare text
    /// leaf collapses to a plain string.
    pub fn to_value(&self) -> Value {
        if self.attributes.is_empty() && self.children.is_empty() {
            if let Some(text) = &self.text {
                return Value::String(text.clone());
            }
        }
        let mut obj = Map::new();
        for (key, value) in &self.attributes {
            obj.insert(format!("@_{key}"), Value::String(value.clone()));
        }
        if let Some(text) = &self.text {
            obj.insert("#text".to_string(), Value::String(text.clone()));
        }
        for (name, children) in &self.children {
            obj.insert(
                name.clone(),
                Value::Array(children.iter().map(Element::to_value).collect()),
            );
        }
        Value::Object(obj)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn root(&self) -> &Element {
        &self.root
    }
}

pub fn parse_document(input: &str) -> Result<Document> {
    let mut reader = Reader::from_str(input);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|err| {
            FlowError::malformed(err.to_string(), u64::try_from(reader.error_position()).ok())
        })?;
        match event {
            Event::Start(start) => {
                ensure_single_root(&root, &stack, &reader)?;
                stack.push(open_element(&start, &reader)?);
            }
            Event::Empty(start) => {
                ensure_single_root(&root, &stack, &reader)?;
                let element = open_element(&start, &reader)?;
                attach(element, &mut stack, &mut root);
            }
            Event::End(_) => {
                // quick-xml already rejects mismatched end names
                let Some(element) = stack.pop() else {
                    return Err(FlowError::malformed(
                        "closing tag without a matching opening tag",
                        position(&reader),
                    ));
                };
                attach(element, &mut stack, &mut root);
            }
            Event::Text(text) => {
                let unescaped = text.unescape().map_err(|err| {
                    FlowError::malformed(err.to_string(), position(&reader))
                })?;
                match stack.last_mut() {
                    Some(current) => current.append_text(&unescaped),
                    None if unescaped.trim().is_empty() => {}
                    None => {
                        return Err(FlowError::malformed(
                            "text content outside of the root element",
                            position(&reader),
                        ));
                    }
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.append_text(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(FlowError::malformed(
            format!("unterminated element <{}>", open.name),
            position(&reader),
        ));
    }

    let root = root.ok_or_else(|| FlowError::malformed("document has no root element", None))?;
    tracing::debug!(
        root = root.name(),
        elements = root.element_count(),
        "parsed flow document"
    );
    Ok(Document { root })
}

fn position(reader: &Reader<&[u8]>) -> Option<u64> {
    u64::try_from(reader.buffer_position()).ok()
}

fn ensure_single_root(
    root: &Option<Element>,
    stack: &[Element],
    reader: &Reader<&[u8]>,
) -> Result<()> {
    if root.is_some() && stack.is_empty() {
        return Err(FlowError::malformed(
            "more than one root element",
            position(reader),
        ));
    }
    Ok(())
}

fn open_element(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|err| FlowError::malformed(err.to_string(), position(reader)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| FlowError::malformed(err.to_string(), position(reader)))?
            .into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

fn attach(mut element: Element, stack: &mut [Element], root: &mut Option<Element>) {
    element.finish_text();
    match stack.last_mut() {
        Some(parent) => parent.push_child(element),
        None => *root = Some(element),
    }
}
