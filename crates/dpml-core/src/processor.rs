/*
 * processor.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Document processor and traversal engine.
 */

//! Document processor.
//!
//! [`DocumentProcessor`] runs registered [`Visitor`]s over a document in one
//! depth-first walk. For every node, visitors run in descending priority
//! order (registration order breaks ties), each seeing the previous
//! visitor's rewrite of the node. Element children are visited after all
//! visitors have run on the element, so they see its rewritten children.
//!
//! The input tree is never mutated; the output is rebuilt from owned
//! nodes.
//!
//! # Example
//!
//! ```ignore
//! use dpml_core::{DocumentProcessor, ProcessorOptions};
//!
//! let processor = DocumentProcessor::from_options(&ProcessorOptions::default())?;
//! let processed = processor.process_blocking(&document, "prompts/tutor.dpml")?;
//! for warning in &processed.warnings {
//!     eprintln!("{}", warning);
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

use dpml_error_reporting::DiagnosticMessage;
use hashlink::LinkedHashMap;

use crate::ast::{Content, Document, Element, Node, Reference, ResolvedReference};
use crate::config::ProcessorOptions;
use crate::context::{DocumentMetadata, DocumentMode, ProcessingContext};
use crate::error::{ProcessingError, Result};
use crate::error_handler::{ErrorHandler, ErrorHandlerOptions};
use crate::reference::{FileProtocolHandler, HttpOptions, HttpProtocolHandler, ReferenceResolver};
use crate::schema::{InMemoryTagRegistry, TagSchemaRegistry};
use crate::visitor::Visitor;
use crate::visitors::{
    AttributeValidationVisitor, ContentReferenceVisitor, DocumentParser, IdValidationVisitor,
    InheritanceVisitor, MarkdownContentVisitor, MarkdownOptions, MetadataVisitor,
    NestingValidationVisitor, ReferenceResolutionVisitor,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a processing run.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub document: Document,
    pub metadata: DocumentMetadata,
    pub id_map: LinkedHashMap<String, Element>,
    pub resolved_references: LinkedHashMap<String, ResolvedReference>,
    pub extensions: LinkedHashMap<String, serde_json::Value>,
    pub warnings: Vec<ProcessingError>,
    /// Errors recovered from when error recovery is on.
    pub errors: Vec<ProcessingError>,
    pub processed_at: SystemTime,
}

impl ProcessedDocument {
    fn from_context(document: Document, ctx: ProcessingContext) -> Self {
        Self {
            document,
            metadata: ctx.metadata,
            id_map: ctx.id_map,
            resolved_references: ctx.resolved_references,
            extensions: ctx.extensions,
            warnings: ctx.warnings,
            errors: ctx.errors,
            processed_at: SystemTime::now(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded errors followed by warnings, as diagnostics.
    pub fn diagnostics(&self) -> Vec<DiagnosticMessage> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .map(ProcessingError::to_diagnostic)
            .collect()
    }
}

/// Runs visitors over documents.
///
/// A processor holds configuration only and can process any number of
/// documents; every run gets a fresh [`ProcessingContext`].
pub struct DocumentProcessor {
    visitors: Vec<Arc<dyn Visitor>>,
    error_handler: Arc<ErrorHandler>,
}

impl DocumentProcessor {
    /// A processor with no visitors.
    pub fn new(options: ErrorHandlerOptions) -> Self {
        Self {
            visitors: Vec::new(),
            error_handler: Arc::new(ErrorHandler::new(options)),
        }
    }

    /// A processor with the standard visitors configured from `options`.
    ///
    /// Loads the tag schema named by `tag-schema`, if any.
    pub fn from_options(options: &ProcessorOptions) -> Result<Self> {
        let registry: Arc<dyn TagSchemaRegistry> = match &options.tag_schema {
            Some(path) => Arc::new(InMemoryTagRegistry::from_path(path).map_err(|e| {
                ProcessingError::other(format!(
                    "Failed to load tag schema {}",
                    path.display()
                ))
                .with_cause(e)
            })?),
            None => Arc::new(InMemoryTagRegistry::new()),
        };
        Ok(Self::standard(options, registry, None))
    }

    /// A processor with the standard visitors, using the given tag registry
    /// and, for markup bases reached through `extends`, document parser.
    pub fn standard(
        options: &ProcessorOptions,
        registry: Arc<dyn TagSchemaRegistry>,
        parser: Option<Arc<dyn DocumentParser>>,
    ) -> Self {
        let mut processor = Self::new(options.error_handler_options());
        let resolver = Arc::new(build_resolver(options));

        let mut inheritance = InheritanceVisitor::new(Arc::clone(&resolver));
        if let Some(parser) = parser {
            inheritance = inheritance.with_parser(parser);
        }

        processor.register_visitor(Arc::new(IdValidationVisitor::new(
            options.id_validation.strict,
        )));
        processor.register_visitor(Arc::new(MetadataVisitor));
        processor.register_visitor(Arc::new(inheritance));
        processor.register_visitor(Arc::new(AttributeValidationVisitor::new(
            Arc::clone(&registry),
            options.attribute_validation.strict,
        )));
        processor.register_visitor(Arc::new(NestingValidationVisitor::new(
            registry,
            options.attribute_validation.strict,
        )));
        processor.register_visitor(Arc::new(ReferenceResolutionVisitor::new(Arc::clone(
            &resolver,
        ))));
        processor.register_visitor(Arc::new(ContentReferenceVisitor::new(resolver)));
        if options.markdown.enabled {
            processor.register_visitor(Arc::new(MarkdownContentVisitor::new(MarkdownOptions {
                sanitize: options.markdown.sanitize,
                line_breaks: options.markdown.line_breaks,
            })));
        }
        processor
    }

    pub fn register_visitor(&mut self, visitor: Arc<dyn Visitor>) {
        self.visitors.push(visitor);
    }

    pub fn error_handler(&self) -> &Arc<ErrorHandler> {
        &self.error_handler
    }

    /// Visitor names in execution order.
    pub fn visitor_names(&self) -> Vec<&str> {
        self.ordered_visitors().iter().map(|v| v.name()).collect()
    }

    fn ordered_visitors(&self) -> Vec<&dyn Visitor> {
        let mut ordered: Vec<&dyn Visitor> = self.visitors.iter().map(|v| v.as_ref()).collect();
        // sort_by_key is stable: equal priorities keep registration order
        ordered.sort_by_key(|v| std::cmp::Reverse(v.priority()));
        ordered
    }

    /// Process `document`, located at `path`.
    ///
    /// # Errors
    ///
    /// Returns the first failure that the error handler does not absorb:
    /// any fatal error, and errors when recovery is off.
    pub async fn process(&self, document: &Document, path: &str) -> Result<ProcessedDocument> {
        let mut ctx = ProcessingContext::new(
            Arc::new(document.clone()),
            path,
            Arc::clone(&self.error_handler),
        );
        let traversal = Traversal {
            visitors: self.ordered_visitors(),
            handler: &self.error_handler,
        };

        tracing::debug!(
            path,
            visitors = traversal.visitors.len(),
            "Processing document"
        );

        let processed = traversal.document(document, &mut ctx).await?;
        debug_assert!(ctx.parent_elements.is_empty());

        tracing::debug!(
            path,
            warnings = ctx.warnings.len(),
            errors = ctx.errors.len(),
            "Processed document"
        );
        Ok(ProcessedDocument::from_context(processed, ctx))
    }

    /// Synchronous wrapper around [`process`](Self::process).
    pub fn process_blocking(&self, document: &Document, path: &str) -> Result<ProcessedDocument> {
        pollster::block_on(self.process(document, path))
    }
}

fn build_resolver(options: &ProcessorOptions) -> ReferenceResolver {
    let mut resolver = ReferenceResolver::with_id_handler().with_cache(options.cache_references);
    let file = match &options.file.base_dir {
        Some(base) => FileProtocolHandler::with_base_dir(base),
        None => FileProtocolHandler::new(),
    };
    resolver.register_handler(Arc::new(file));
    if options.http.enabled {
        resolver.register_handler(Arc::new(HttpProtocolHandler::new(&HttpOptions {
            timeout: std::time::Duration::from_millis(options.http.timeout_ms),
            insecure_tls: options.http.insecure_tls,
        })));
    }
    resolver
}

/// One walk over a document with a fixed visitor order.
struct Traversal<'p> {
    visitors: Vec<&'p dyn Visitor>,
    handler: &'p ErrorHandler,
}

impl<'p> Traversal<'p> {
    /// Route a visitor failure. `Ok` means traversal continues with the
    /// node as it was before the failing visitor.
    fn recover(&self, visitor: &dyn Visitor, error: ProcessingError, ctx: &mut ProcessingContext) -> Result<()> {
        tracing::debug!(visitor = visitor.name(), error = %error, "Visitor failed");
        let mode = ctx.mode_at(None);
        self.handler.handle_in_mode(error, mode, ctx)
    }

    async fn document(&self, document: &Document, ctx: &mut ProcessingContext) -> Result<Document> {
        let mut rewritten: Option<Document> = None;
        for visitor in &self.visitors {
            let Some(callback) = visitor.as_document_visitor() else {
                continue;
            };
            tracing::debug!(visitor = visitor.name(), node = "document", "Running visitor");
            let current = rewritten.as_ref().unwrap_or(document);
            match callback.visit_document(current, ctx).await {
                Ok(Some(replacement)) => rewritten = Some(replacement),
                Ok(None) => {}
                Err(error) => self.recover(*visitor, error, ctx)?,
            }
        }

        let current = rewritten.as_ref().unwrap_or(document);
        let children = self.children(&current.children, ctx).await?;
        Ok(Document {
            children,
            span: current.span,
        })
    }

    fn children<'a>(
        &'a self,
        nodes: &'a [Node],
        ctx: &'a mut ProcessingContext,
    ) -> BoxFuture<'a, Result<Vec<Node>>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(nodes.len());
            for node in nodes {
                out.push(self.node(node, ctx).await?);
            }
            Ok(out)
        })
    }

    async fn node(&self, node: &Node, ctx: &mut ProcessingContext) -> Result<Node> {
        match node {
            Node::Element(element) => self.element(element, ctx).await.map(Node::Element),
            Node::Content(content) => self.content(content, ctx).await.map(Node::Content),
            Node::Reference(reference) => self.reference(reference, ctx).await.map(Node::Reference),
            Node::Document(document) => {
                // Nested documents only arise from resolved values; walk
                // them without re-running document callbacks.
                let children = self.children(&document.children, ctx).await?;
                Ok(Node::Document(Document {
                    children,
                    span: document.span,
                }))
            }
        }
    }

    /// Visit an element with its own `mode` applied to the subtree. The
    /// previous mode is restored whether or not the visit succeeds.
    async fn element(&self, element: &Element, ctx: &mut ProcessingContext) -> Result<Element> {
        let saved_mode = ctx.document_mode;
        if let Some(mode) = DocumentMode::declared_by(element) {
            ctx.document_mode = Some(mode);
        }
        let result = self.element_scoped(element, ctx).await;
        ctx.document_mode = saved_mode;
        result
    }

    async fn element_scoped(&self, element: &Element, ctx: &mut ProcessingContext) -> Result<Element> {
        let mut rewritten: Option<Element> = None;
        for visitor in &self.visitors {
            let Some(callback) = visitor.as_element_visitor() else {
                continue;
            };
            let current = rewritten.as_ref().unwrap_or(element);
            tracing::debug!(
                visitor = visitor.name(),
                node = %current.tag_name,
                "Running visitor"
            );
            match callback.visit_element(current, ctx).await {
                Ok(Some(replacement)) => rewritten = Some(replacement),
                Ok(None) => {}
                Err(error) => self.recover(*visitor, error, ctx)?,
            }
        }

        let current = rewritten.as_ref().unwrap_or(element);
        ctx.parent_elements.push(current.shallow_clone());
        let children = self.children(&current.children, ctx).await;
        ctx.parent_elements.pop();
        let children = children?;

        let mut out = rewritten.unwrap_or_else(|| element.shallow_clone());
        out.children = children;
        Ok(out)
    }

    async fn content(&self, content: &Content, ctx: &mut ProcessingContext) -> Result<Content> {
        let mut rewritten: Option<Content> = None;
        for visitor in &self.visitors {
            let Some(callback) = visitor.as_content_visitor() else {
                continue;
            };
            tracing::debug!(visitor = visitor.name(), node = "content", "Running visitor");
            let current = rewritten.as_ref().unwrap_or(content);
            match callback.visit_content(current, ctx).await {
                Ok(Some(replacement)) => rewritten = Some(replacement),
                Ok(None) => {}
                Err(error) => self.recover(*visitor, error, ctx)?,
            }
        }
        Ok(rewritten.unwrap_or_else(|| content.clone()))
    }

    async fn reference(&self, reference: &Reference, ctx: &mut ProcessingContext) -> Result<Reference> {
        let mut rewritten: Option<Reference> = None;
        for visitor in &self.visitors {
            let Some(callback) = visitor.as_reference_visitor() else {
                continue;
            };
            tracing::debug!(visitor = visitor.name(), node = "reference", "Running visitor");
            let current = rewritten.as_ref().unwrap_or(reference);
            match callback.visit_reference(current, ctx).await {
                Ok(Some(replacement)) => rewritten = Some(replacement),
                Ok(None) => {}
                Err(error) => self.recover(*visitor, error, ctx)?,
            }
        }
        Ok(rewritten.unwrap_or_else(|| reference.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProcessingErrorKind, Severity};
    use crate::visitor::{ContentVisitor, ElementVisitor};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the element tags it sees and the parent stack at each visit.
    struct Recorder {
        name: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Visitor for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn as_element_visitor(&self) -> Option<&dyn ElementVisitor> {
            Some(self)
        }
    }

    #[async_trait]
    impl ElementVisitor for Recorder {
        async fn visit_element(
            &self,
            element: &Element,
            ctx: &mut ProcessingContext,
        ) -> Result<Option<Element>> {
            let parents: Vec<&str> = ctx
                .parent_elements
                .iter()
                .map(|p| p.tag_name.as_str())
                .collect();
            self.log.lock().unwrap().push(format!(
                "{}:{}[{}]",
                self.name,
                element.tag_name,
                parents.join(">")
            ));
            Ok(None)
        }
    }

    struct Upper;

    impl Visitor for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn as_content_visitor(&self) -> Option<&dyn ContentVisitor> {
            Some(self)
        }
    }

    #[async_trait]
    impl ContentVisitor for Upper {
        async fn visit_content(
            &self,
            content: &Content,
            _ctx: &mut ProcessingContext,
        ) -> Result<Option<Content>> {
            Ok(Some(Content {
                value: content.value.to_uppercase(),
                ..content.clone()
            }))
        }
    }

    fn sample() -> Document {
        Document::new(vec![Node::Element(
            Element::new("prompt")
                .with_child(Element::new("role").with_child(Content::new("hi")))
                .with_child(Element::new("task")),
        )])
    }

    #[tokio::test]
    async fn test_priority_order_and_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut processor = DocumentProcessor::new(ErrorHandlerOptions::default());
        for (name, priority) in [("low", 1), ("high", 10), ("tie-a", 5), ("tie-b", 5)] {
            processor.register_visitor(Arc::new(Recorder {
                name,
                priority,
                log: log.clone(),
            }));
        }

        assert_eq!(processor.visitor_names(), vec!["high", "tie-a", "tie-b", "low"]);

        let doc = Document::new(vec![Node::Element(Element::new("prompt"))]);
        processor.process(&doc, "doc.dpml").await.unwrap();

        let names: Vec<String> = log
            .lock()
            .unwrap()
            .iter()
            .map(|entry| entry.split(':').next().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["high", "tie-a", "tie-b", "low"]);
    }

    #[tokio::test]
    async fn test_parent_stack_holds_ancestors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut processor = DocumentProcessor::new(ErrorHandlerOptions::default());
        processor.register_visitor(Arc::new(Recorder {
            name: "r",
            priority: 0,
            log: log.clone(),
        }));

        processor.process(&sample(), "doc.dpml").await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["r:prompt[]", "r:role[prompt]", "r:task[prompt]"]
        );
    }

    #[tokio::test]
    async fn test_output_rebuilt_input_untouched() {
        let mut processor = DocumentProcessor::new(ErrorHandlerOptions::default());
        processor.register_visitor(Arc::new(Upper));
        let input = sample();

        let processed = processor.process(&input, "doc.dpml").await.unwrap();

        let role = processed.document.root_element().unwrap().children[0]
            .as_element()
            .unwrap();
        assert!(matches!(&role.children[0], Node::Content(c) if c.value == "HI"));
        assert_eq!(input, sample());
    }

    #[test]
    fn test_process_blocking() {
        let processor = DocumentProcessor::new(ErrorHandlerOptions::default());
        let processed = processor.process_blocking(&sample(), "doc.dpml").unwrap();
        assert_eq!(processed.document, sample());
        assert!(processed.diagnostics().is_empty());
    }

    #[test]
    fn test_diagnostics_errors_first() {
        let processed = ProcessedDocument {
            document: Document::default(),
            metadata: DocumentMetadata::default(),
            id_map: LinkedHashMap::new(),
            resolved_references: LinkedHashMap::new(),
            extensions: LinkedHashMap::new(),
            warnings: vec![
                ProcessingError::new(ProcessingErrorKind::UnknownAttribute, "w")
                    .with_severity(Severity::Warning),
            ],
            errors: vec![ProcessingError::new(ProcessingErrorKind::InvalidNesting, "e")],
            processed_at: SystemTime::now(),
        };

        let diagnostics = processed.diagnostics();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].code.as_deref(), Some("D-3-4"));
        assert_eq!(diagnostics[1].code.as_deref(), Some("D-3-3"));
        assert!(processed.has_errors());
    }

    #[test]
    fn test_standard_visitor_order() {
        let processor = DocumentProcessor::from_options(&ProcessorOptions::default()).unwrap();
        assert_eq!(
            processor.visitor_names(),
            vec![
                "id-validation",
                "metadata",
                "inheritance",
                "attribute-validation",
                "nesting-validation",
                "reference-resolution",
                "content-references",
                "markdown",
            ]
        );
    }
}
