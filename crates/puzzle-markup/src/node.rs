//! Owned markup tree handed to the converter.
//!
//! Pages are parsed with `scraper` and lowered into [`MarkupNode`] so the
//! converter only sees tag names, ordered children, attributes and raw text.

use std::fmt::Write as _;

use scraper::{ElementRef, Html, Node};

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A node in a parsed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element(Element),
    /// Text in markup form: character references are still encoded.
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
}

impl MarkupNode {
    pub fn element(tag: impl Into<String>, children: Vec<MarkupNode>) -> Self {
        Self::Element(Element {
            tag: tag.into(),
            attributes: Vec::new(),
            children,
        })
    }

    pub fn text(raw: impl Into<String>) -> Self {
        Self::Text(raw.into())
    }

    /// Adds an attribute; ignored for text and comment nodes.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Element(element) = &mut self {
            element.attributes.push((name.into(), value.into()));
        }
        self
    }

    /// Parses a full HTML document and lowers it, rooted at `<html>`.
    pub fn parse_document(html: &str) -> Self {
        let document = Html::parse_document(html);
        lower_element(document.root_element())
    }

    /// Parses an HTML fragment; the result is an `<html>` wrapper around it.
    pub fn parse_fragment(html: &str) -> Self {
        let fragment = Html::parse_fragment(html);
        lower_element(fragment.root_element())
    }

    /// Element name, or `#text` / `#comment` for the other node kinds.
    pub fn tag_name(&self) -> &str {
        match self {
            Self::Element(element) => &element.tag,
            Self::Text(_) => "#text",
            Self::Comment(_) => "#comment",
        }
    }

    pub fn children(&self) -> &[MarkupNode] {
        match self {
            Self::Element(element) => &element.children,
            Self::Text(_) | Self::Comment(_) => &[],
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Self::Element(element) => element
                .attributes
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str()),
            Self::Text(_) | Self::Comment(_) => None,
        }
    }

    pub fn is_element(&self, tag: &str) -> bool {
        matches!(self, Self::Element(element) if element.tag.eq_ignore_ascii_case(tag))
    }

    /// Concatenated raw text of every descendant text node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in self.descendants() {
            if let Self::Text(raw) = node {
                out.push_str(raw);
            }
        }
        out
    }

    /// Serializes the children of this node back into HTML.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            write_html(child, &mut out);
        }
        out
    }

    /// Pre-order traversal starting with `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a MarkupNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a MarkupNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

fn lower_element(element: ElementRef<'_>) -> MarkupNode {
    let value = element.value();
    let mut children = Vec::new();

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            children.push(lower_element(child_element));
            continue;
        }
        match child.value() {
            // html5ever decodes references while parsing; restore the markup
            // form so decoding happens exactly once, in the converter.
            Node::Text(text) => children.push(MarkupNode::Text(
                html_escape::encode_text(&**text).into_owned(),
            )),
            Node::Comment(comment) => children.push(MarkupNode::Comment(comment.to_string())),
            _ => {}
        }
    }

    MarkupNode::Element(Element {
        tag: value.name().to_string(),
        attributes: value
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        children,
    })
}

fn write_html(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(raw) => out.push_str(raw),
        MarkupNode::Comment(comment) => {
            let _ = write!(out, "<!--{comment}-->");
        }
        MarkupNode::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                let _ = write!(
                    out,
                    " {name}=\"{}\"",
                    html_escape::encode_double_quoted_attribute(value)
                );
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&element.tag.as_str()) {
                return;
            }
            for child in &element.children {
                write_html(child, out);
            }
            let _ = write!(out, "</{}>", element.tag);
        }
    }
}
