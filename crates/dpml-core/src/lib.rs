//! Post-parse processing for DPML documents
//!
//! This crate takes the tree produced by the DPML parser and runs it
//! through a pipeline of visitors that validate it, resolve references and
//! inheritance, extract metadata and render Markdown content.
//!
//! # Architecture
//!
//! - [`DocumentProcessor`] - Runs visitors in priority order over a document
//! - [`ProcessingContext`] - Per-run mutable state shared by visitors
//! - [`ErrorHandler`] - Severity policy: warn, record, or abort
//! - [`ReferenceResolver`] - Protocol dispatch with a per-run cache
//! - [`TagSchemaRegistry`] - Tag definitions for the validation visitors
//!
//! # Example
//!
//! ```ignore
//! use dpml_core::{DocumentProcessor, ProcessorOptions};
//!
//! let options = ProcessorOptions::from_path("dpml.yml".as_ref())?;
//! let processor = DocumentProcessor::from_options(&options)?;
//!
//! // `document` comes from the DPML parser
//! let processed = processor.process_blocking(&document, "prompts/tutor.dpml")?;
//! for diagnostic in processed.diagnostics() {
//!     eprintln!("{}", diagnostic.to_text());
//! }
//! ```

pub mod ast;
pub mod config;
pub mod context;
pub mod error;
pub mod error_handler;
pub mod processor;
pub mod reference;
pub mod schema;
pub mod visitor;
pub mod visitors;

// Re-export commonly used types
pub use ast::{
    Content, Document, Element, Node, Reference, ReferenceValue, ResolvedReference,
};
pub use config::{ConfigError, ProcessorOptions};
pub use context::{DocumentMetadata, DocumentMode, ProcessingContext};
pub use error::{ProcessingError, ProcessingErrorKind, ProtocolError, Result, Severity};
pub use error_handler::{ErrorCallback, ErrorHandler, ErrorHandlerOptions};
pub use processor::{DocumentProcessor, ProcessedDocument};
pub use reference::{ProtocolHandler, ReferenceResolver};
pub use schema::{InMemoryTagRegistry, TagDefinition, TagSchemaRegistry};
pub use visitor::{ContentVisitor, DocumentVisitor, ElementVisitor, ReferenceVisitor, Visitor};
pub use visitors::DocumentParser;
