/*
 * visitors/inheritance.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * `extends` resolution.
 */

//! Inheritance.
//!
//! An element with `extends="..."` is merged with the element it names.
//! The base may itself extend another element, so bases are resolved
//! recursively before merging. [`ProcessingContext::inheritance_chain`]
//! records the `extends` values currently being resolved and a repeat is a
//! fatal circular reference.
//!
//! Supported `extends` forms:
//!
//! - `id:<id>` (or a bare `<id>`)
//! - `file:<path>[#<id>]`
//! - `http(s)://...[#<id>]`
//!
//! Merge rules: attributes of the extending element win, missing ones are
//! copied from the base except `id`. An element without children of its
//! own takes the base's children.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::INHERITANCE_PRIORITY;
use crate::ast::{Document, Element, Node, Reference, ReferenceValue};
use crate::context::ProcessingContext;
use crate::error::{ProcessingError, ProcessingErrorKind, Result};
use crate::reference::ReferenceResolver;
use crate::visitor::{ElementVisitor, Visitor};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Turns fetched DPML source into a document.
///
/// Needed only when a `file:` or `http:` base returns markup rather than a
/// serialized node tree.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, source: &str, path: &str) -> std::result::Result<Document, String>;
}

/// Resolves `extends` attributes.
pub struct InheritanceVisitor {
    resolver: Arc<ReferenceResolver>,
    parser: Option<Arc<dyn DocumentParser>>,
}

impl InheritanceVisitor {
    pub fn new(resolver: Arc<ReferenceResolver>) -> Self {
        Self {
            resolver,
            parser: None,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Resolve `element` against its base chain. Elements without
    /// `extends` are returned as they are.
    fn resolve_element<'a>(
        &'a self,
        element: &'a Element,
        ctx: &'a mut ProcessingContext,
    ) -> BoxFuture<'a, Result<Element>> {
        Box::pin(async move {
            let Some(extends) = element.attr("extends").map(str::trim) else {
                return Ok(element.clone());
            };

            if ctx.inheritance_chain.iter().any(|entry| entry == extends) {
                return Err(
                    ProcessingError::circular_reference(&ctx.inheritance_chain, extends)
                        .with_span(element.span),
                );
            }

            ctx.inheritance_chain.push(extends.to_string());
            let result = self.resolve_with_base(element, extends, ctx).await;
            ctx.inheritance_chain.pop();
            result
        })
    }

    async fn resolve_with_base(
        &self,
        element: &Element,
        extends: &str,
        ctx: &mut ProcessingContext,
    ) -> Result<Element> {
        let base = self.load_base(element, extends, ctx).await?;
        let base = self.resolve_element(&base, ctx).await?;
        tracing::debug!(
            tag = %element.tag_name,
            extends,
            depth = ctx.inheritance_chain.len(),
            "Merged base element"
        );
        Ok(merge(element, &base))
    }

    async fn load_base(
        &self,
        element: &Element,
        extends: &str,
        ctx: &mut ProcessingContext,
    ) -> Result<Element> {
        let target = Reference::parse(extends).unwrap_or_else(|| Reference::new("id", extends));

        match target.protocol.as_str() {
            "id" => ctx.find_element(&target.path).cloned().ok_or_else(|| {
                base_not_found(extends).with_span(element.span)
            }),
            "file" | "http" | "https" => {
                let (resource, fragment) = match target.path.split_once('#') {
                    Some((resource, fragment)) => (resource, Some(fragment)),
                    None => (target.path.as_str(), None),
                };
                let mut reference = Reference::new(target.protocol.clone(), resource);
                reference.span = element.span;

                let value = self.resolver.resolve(&reference, ctx).await?;
                let node = self.value_to_node(value, &reference.cache_key())?;
                select_base(node, fragment)
                    .ok_or_else(|| base_not_found(extends).with_span(element.span))
            }
            _ => Err(ProcessingError::unsupported_inheritance(extends).with_span(element.span)),
        }
    }

    fn value_to_node(&self, value: ReferenceValue, source: &str) -> Result<Node> {
        match value {
            ReferenceValue::Node(node) => Ok(*node),
            ReferenceValue::Json(json) => serde_json::from_value(json).map_err(|e| {
                ProcessingError::new(
                    ProcessingErrorKind::ReferenceResolutionFailed,
                    format!("'{}' does not contain a DPML element", source),
                )
                .with_cause(e)
            }),
            ReferenceValue::Text(text) => {
                let parser = self.parser.as_ref().ok_or_else(|| {
                    ProcessingError::new(
                        ProcessingErrorKind::ReferenceResolutionFailed,
                        format!("No document parser available to read '{}'", source),
                    )
                })?;
                parser.parse(&text, source).map(Node::Document).map_err(|message| {
                    ProcessingError::new(
                        ProcessingErrorKind::ReferenceResolutionFailed,
                        format!("Failed to parse '{}': {}", source, message),
                    )
                })
            }
        }
    }
}

fn base_not_found(extends: &str) -> ProcessingError {
    ProcessingError::new(
        ProcessingErrorKind::ReferenceNotFound,
        format!("Base element '{}' not found", extends),
    )
}

/// Pick the base out of a fetched node: the element with `fragment` as
/// its id, or the node itself (a document contributes its root element).
fn select_base(node: Node, fragment: Option<&str>) -> Option<Element> {
    match (fragment, node) {
        (Some(id), node) => node.find_by_id(id).cloned(),
        (None, Node::Element(element)) => Some(element),
        (None, Node::Document(document)) => document.root_element().cloned(),
        (None, _) => None,
    }
}

/// Whitespace-only text does not count as children of its own.
fn has_own_children(element: &Element) -> bool {
    element.children.iter().any(|child| match child {
        Node::Content(content) => !content.value.trim().is_empty(),
        _ => true,
    })
}

/// Merge `child` over `base`.
pub(crate) fn merge(child: &Element, base: &Element) -> Element {
    let mut merged = child.clone();

    for (name, value) in &base.attributes {
        if name != "id" && !merged.attributes.contains_key(name) {
            merged.attributes.insert(name.clone(), value.clone());
        }
    }

    if !has_own_children(child) {
        merged.children = base.children.clone();
    }

    merged
}

impl Visitor for InheritanceVisitor {
    fn name(&self) -> &str {
        "inheritance"
    }

    fn priority(&self) -> i32 {
        INHERITANCE_PRIORITY
    }

    fn as_element_visitor(&self) -> Option<&dyn ElementVisitor> {
        Some(self)
    }
}

#[async_trait]
impl ElementVisitor for InheritanceVisitor {
    async fn visit_element(
        &self,
        element: &Element,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Element>> {
        if !element.has_attr("extends") {
            return Ok(None);
        }
        self.resolve_element(element, ctx).await.map(Some)
    }
}
