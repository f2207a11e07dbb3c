//! Document metadata extraction.

use async_trait::async_trait;

use super::METADATA_PRIORITY;
use crate::ast::{Document, Element, Node};
use crate::context::{DocumentMetadata, DocumentMode, ProcessingContext};
use crate::error::{ProcessingError, Result};
use crate::visitor::{DocumentVisitor, Visitor};

/// Reads document-level settings from the root element.
///
/// `mode`, `lang`, `schema` and `version` come from the root's attributes,
/// and each direct `<meta name="..." content="...">` child adds an entry.
/// A declared mode becomes the default for the whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataVisitor;

impl MetadataVisitor {
    pub fn extract(root: &Element) -> DocumentMetadata {
        let mut metadata = DocumentMetadata {
            mode: DocumentMode::declared_by(root),
            lang: root.attr("lang").map(str::to_owned),
            schema: root.attr("schema").map(str::to_owned),
            version: root.attr("version").map(str::to_owned),
            ..Default::default()
        };

        for meta in root
            .children
            .iter()
            .filter_map(Node::as_element)
            .filter(|child| child.tag_name == "meta")
        {
            if let (Some(name), Some(content)) = (meta.attr("name"), meta.attr("content")) {
                metadata
                    .entries
                    .insert(name.to_string(), content.to_string());
            }
        }

        metadata
    }
}

impl Visitor for MetadataVisitor {
    fn name(&self) -> &str {
        "metadata"
    }

    fn priority(&self) -> i32 {
        METADATA_PRIORITY
    }

    fn as_document_visitor(&self) -> Option<&dyn DocumentVisitor> {
        Some(self)
    }
}

#[async_trait]
impl DocumentVisitor for MetadataVisitor {
    async fn visit_document(
        &self,
        document: &Document,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Document>> {
        let Some(root) = document.root_element() else {
            return Ok(None);
        };

        let metadata = Self::extract(root);
        if let Some(mode) = metadata.mode {
            ctx.document_mode = Some(mode);
        }

        let annotation = serde_json::to_value(&metadata).map_err(|e| {
            ProcessingError::other("Failed to serialize document metadata").with_cause(e)
        })?;
        ctx.metadata = metadata;

        let mut annotated = document.clone();
        if let Some(Node::Element(root)) = annotated
            .children
            .iter_mut()
            .find(|node| matches!(node, Node::Element(_)))
        {
            root.resolved_metadata = Some(annotation);
        }
        Ok(Some(annotated))
    }
}
