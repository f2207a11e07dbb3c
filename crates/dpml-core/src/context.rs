/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Per-run processing state threaded through every visitor.
 */

//! Processing context.
//!
//! A [`ProcessingContext`] is created at the start of each
//! [`DocumentProcessor::process`](crate::processor::DocumentProcessor::process)
//! call, passed by `&mut` to every visitor, and dropped when the run ends.
//! It is never reused across runs.

use std::fmt;
use std::sync::Arc;

use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};

use crate::ast::{Document, Element, ResolvedReference};
use crate::error::{ProcessingError, Result, Severity};
use crate::error_handler::ErrorHandler;

/// Failure tolerance of a subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMode {
    /// Validation failures are errors
    Strict,
    /// Validation failures are warnings
    #[default]
    Loose,
}

impl DocumentMode {
    /// Parse a `mode` attribute value. Unrecognized values are ignored.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "loose" => Some(Self::Loose),
            _ => None,
        }
    }

    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Loose }
    }

    pub fn is_strict(&self) -> bool {
        *self == Self::Strict
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Loose => "loose",
        }
    }

    /// The mode declared by an element's own `mode` attribute.
    pub fn declared_by(element: &Element) -> Option<Self> {
        element.attr("mode").and_then(Self::parse)
    }

    /// Resolve the mode that applies at `element`.
    ///
    /// The element's own `mode` wins, then the inherited mode, then
    /// `fallback_strict`. Every mode decision in the crate goes through
    /// here.
    pub fn resolve(
        element: Option<&Element>,
        inherited: Option<DocumentMode>,
        fallback_strict: bool,
    ) -> Self {
        element
            .and_then(Self::declared_by)
            .or(inherited)
            .unwrap_or_else(|| Self::from_strict(fallback_strict))
    }
}

impl fmt::Display for DocumentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document-level metadata extracted by the metadata pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<DocumentMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// `<meta name="..." content="...">` entries in document order
    #[serde(default, skip_serializing_if = "LinkedHashMap::is_empty")]
    pub entries: LinkedHashMap<String, String>,
}

/// Mutable state for one processing run.
pub struct ProcessingContext {
    /// The input document, as handed to `process`.
    pub document: Arc<Document>,

    /// Path of the document, used for relative references and diagnostics.
    pub path: String,

    /// Ancestors of the node being visited, nearest last. Entries carry no
    /// children.
    pub parent_elements: Vec<Element>,

    /// Elements by `id`, collected as the traversal reaches them.
    pub id_map: LinkedHashMap<String, Element>,

    /// Resolution cache keyed by `protocol:path`.
    pub resolved_references: LinkedHashMap<String, ResolvedReference>,

    /// Mode of the current subtree, if any element above declared one.
    pub document_mode: Option<DocumentMode>,

    pub metadata: DocumentMetadata,

    /// `extends` targets currently being resolved.
    pub inheritance_chain: Vec<String>,

    /// Side channel for data defined by third-party visitors.
    pub extensions: LinkedHashMap<String, serde_json::Value>,

    /// Warnings reported so far.
    pub warnings: Vec<ProcessingError>,

    /// Errors reported and recovered from so far.
    pub errors: Vec<ProcessingError>,

    error_handler: Arc<ErrorHandler>,
}

impl ProcessingContext {
    pub fn new(document: Arc<Document>, path: impl Into<String>, handler: Arc<ErrorHandler>) -> Self {
        Self {
            document,
            path: path.into(),
            parent_elements: Vec::new(),
            id_map: LinkedHashMap::new(),
            resolved_references: LinkedHashMap::new(),
            document_mode: None,
            metadata: DocumentMetadata::default(),
            inheritance_chain: Vec::new(),
            extensions: LinkedHashMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            error_handler: handler,
        }
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.error_handler
    }

    /// The nearest ancestor element.
    pub fn parent(&self) -> Option<&Element> {
        self.parent_elements.last()
    }

    /// Mode at `element` (or at the current position when `None`).
    pub fn mode_at(&self, element: Option<&Element>) -> DocumentMode {
        DocumentMode::resolve(
            element,
            self.document_mode,
            self.error_handler.default_strict(),
        )
    }

    /// Find an element by id: collected ids first, then the input document.
    pub fn find_element(&self, id: &str) -> Option<&Element> {
        self.id_map
            .get(id)
            .or_else(|| self.document.find_by_id(id))
    }

    /// Route an error through the handler at an explicit severity.
    pub fn report(&mut self, error: ProcessingError, severity: Severity) -> Result<()> {
        let handler = Arc::clone(&self.error_handler);
        handler.handle_error(error, severity, self)
    }

    /// Route an error through the handler with severity taken from the mode
    /// at `element`.
    pub fn report_in_context(
        &mut self,
        error: ProcessingError,
        element: Option<&Element>,
    ) -> Result<()> {
        let handler = Arc::clone(&self.error_handler);
        handler.handle_with_context(error, element, self)
    }

    pub fn record_warning(&mut self, warning: ProcessingError) {
        self.warnings.push(warning);
    }

    pub fn record_error(&mut self, error: ProcessingError) {
        self.errors.push(error);
    }
}

impl fmt::Debug for ProcessingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingContext")
            .field("path", &self.path)
            .field("depth", &self.parent_elements.len())
            .field("ids", &self.id_map.len())
            .field("cached_references", &self.resolved_references.len())
            .field("document_mode", &self.document_mode)
            .field("inheritance_chain", &self.inheritance_chain)
            .field("warnings_count", &self.warnings.len())
            .field("errors_count", &self.errors.len())
            .finish()
    }
}
