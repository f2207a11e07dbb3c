/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Document model produced by the DPML parser.
 */

//! Document model.
//!
//! The parser (an external collaborator) produces a tree of [`Node`]s rooted
//! at a single [`Document`]. Processing never mutates a tree in place: each
//! visitor returns an owned replacement and the engine rebuilds ancestors
//! from the visited children.
//!
//! Attributes are a flat string map. Typing them is the job of the attribute
//! validation pass, not of the model.

use dpml_source_map::Span;
use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};

/// Attribute map with stable (source) ordering.
pub type Attributes = LinkedHashMap<String, String>;

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Node {
    Document(Document),
    Element(Element),
    Content(Content),
    Reference(Reference),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::Document(d) => d.span,
            Node::Element(e) => e.span,
            Node::Content(c) => c.span,
            Node::Reference(r) => r.span,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Children of container nodes; leaves have none.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document(d) => &d.children,
            Node::Element(e) => &e.children,
            Node::Content(_) | Node::Reference(_) => &[],
        }
    }

    /// Depth-first search for the element carrying `id`, including `self`.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        if let Node::Element(element) = self
            && element.id() == Some(id)
        {
            return Some(element);
        }
        self.children()
            .iter()
            .find_map(|child| child.find_by_id(id))
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Content> for Node {
    fn from(content: Content) -> Self {
        Node::Content(content)
    }
}

impl From<Reference> for Node {
    fn from(reference: Reference) -> Self {
        Node::Reference(reference)
    }
}

/// The root of a parsed document. Exactly one per processing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default)]
    pub span: Span,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self {
            children,
            span: Span::default(),
        }
    }

    /// The first element child, conventionally the document's root tag.
    pub fn root_element(&self) -> Option<&Element> {
        self.children.iter().find_map(Node::as_element)
    }

    /// Depth-first search for the element carrying `id`.
    pub fn find_by_id(&self, id: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| child.find_by_id(id))
    }
}

/// A tagged element with attributes and children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub tag_name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default)]
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_metadata: Option<serde_json::Value>,
}

impl Element {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
            span: Span::default(),
            resolved_metadata: None,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Copy of this element without its children.
    ///
    /// The parent stack records ancestors this way so that pushing an
    /// element does not clone its whole subtree.
    pub fn shallow_clone(&self) -> Element {
        Element {
            tag_name: self.tag_name.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
            span: self.span,
            resolved_metadata: self.resolved_metadata.clone(),
        }
    }
}

/// Leaf text. Passes may rewrite `value`; `original_markdown` keeps the
/// pre-transform text once the Markdown pass has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    pub value: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_markdown: Option<String>,
}

impl Content {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            span: Span::default(),
            original_markdown: None,
        }
    }
}

/// A reference to another resource, e.g. `id:intro` or `file:./base.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub protocol: String,
    pub path: String,
    #[serde(default)]
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ReferenceValue>,
}

impl Reference {
    pub fn new(protocol: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            path: path.into(),
            span: Span::default(),
            resolved: None,
        }
    }

    /// Parse `protocol:path`. Returns `None` when there is no scheme.
    pub fn parse(uri: &str) -> Option<Self> {
        let (protocol, path) = uri.split_once(':')?;
        if protocol.is_empty() {
            return None;
        }
        Some(Self::new(protocol, path))
    }

    /// Cache key identifying the referenced resource.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.protocol, self.path)
    }
}

/// Value a protocol handler produced. Its shape is protocol-defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ReferenceValue {
    Text(String),
    Json(serde_json::Value),
    Node(Box<Node>),
}

impl ReferenceValue {
    /// Render the value for substitution into text.
    ///
    /// Strings are inserted as-is, other JSON primitives through their
    /// display form, objects, arrays and nodes as serialized JSON.
    pub fn to_text(&self) -> String {
        match self {
            ReferenceValue::Text(text) => text.clone(),
            ReferenceValue::Json(serde_json::Value::String(s)) => s.clone(),
            ReferenceValue::Json(
                value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)),
            ) => serde_json::to_string(value).unwrap_or_default(),
            ReferenceValue::Json(value) => value.to_string(),
            ReferenceValue::Node(node) => serde_json::to_string(node).unwrap_or_default(),
        }
    }
}

/// A reference together with the value it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub reference: Reference,
    pub value: ReferenceValue,
}
