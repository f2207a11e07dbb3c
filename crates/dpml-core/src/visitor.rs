/*
 * visitor.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Visitor traits for document processing passes.
 */

//! Visitor traits.
//!
//! A pass over the document is a [`Visitor`]. Which node types it handles
//! is declared structurally: each `as_*_visitor` accessor returns `Some`
//! when the visitor implements the matching callback trait.
//!
//! Callbacks receive the node by reference and return
//! `Ok(None)` to keep it unchanged or `Ok(Some(replacement))` to rewrite it.
//! The next visitor in priority order sees the replacement.
//!
//! # Example
//!
//! ```ignore
//! use async_trait::async_trait;
//! use dpml_core::{Content, ContentVisitor, ProcessingContext, Result, Visitor};
//!
//! struct Shout;
//!
//! impl Visitor for Shout {
//!     fn name(&self) -> &str { "shout" }
//!     fn as_content_visitor(&self) -> Option<&dyn ContentVisitor> { Some(self) }
//! }
//!
//! #[async_trait]
//! impl ContentVisitor for Shout {
//!     async fn visit_content(
//!         &self,
//!         content: &Content,
//!         _ctx: &mut ProcessingContext,
//!     ) -> Result<Option<Content>> {
//!         let mut out = content.clone();
//!         out.value = out.value.to_uppercase();
//!         Ok(Some(out))
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::ast::{Content, Document, Element, Reference};
use crate::context::ProcessingContext;
use crate::error::Result;

/// A processing pass.
///
/// Visitors must be `Send + Sync` so a processor can be shared. They hold
/// configuration only; per-run state lives in [`ProcessingContext`].
pub trait Visitor: Send + Sync {
    /// Name used in log fields.
    fn name(&self) -> &str;

    /// Higher priority runs first. Equal priorities keep registration order.
    fn priority(&self) -> i32 {
        0
    }

    fn as_document_visitor(&self) -> Option<&dyn DocumentVisitor> {
        None
    }

    fn as_element_visitor(&self) -> Option<&dyn ElementVisitor> {
        None
    }

    fn as_content_visitor(&self) -> Option<&dyn ContentVisitor> {
        None
    }

    fn as_reference_visitor(&self) -> Option<&dyn ReferenceVisitor> {
        None
    }
}

#[async_trait]
pub trait DocumentVisitor: Send + Sync {
    /// Called once, before any child is visited.
    async fn visit_document(
        &self,
        document: &Document,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Document>>;
}

#[async_trait]
pub trait ElementVisitor: Send + Sync {
    /// Called before the element's children are visited.
    ///
    /// The element is pushed onto the parent stack only after every element
    /// visitor has run on it, so during this call the stack holds its
    /// ancestors (nearest last) and never the element itself. Use the
    /// `element` argument, not [`ProcessingContext::parent`], to inspect the
    /// node being visited.
    async fn visit_element(
        &self,
        element: &Element,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Element>>;
}

#[async_trait]
pub trait ContentVisitor: Send + Sync {
    async fn visit_content(
        &self,
        content: &Content,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Content>>;
}

#[async_trait]
pub trait ReferenceVisitor: Send + Sync {
    async fn visit_reference(
        &self,
        reference: &Reference,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Reference>>;
}
