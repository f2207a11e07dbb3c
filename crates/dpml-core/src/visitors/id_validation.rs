//! Id collection and duplicate detection.

use async_trait::async_trait;

use super::ID_VALIDATION_PRIORITY;
use crate::ast::{Document, Element};
use crate::context::ProcessingContext;
use crate::error::{ProcessingError, ProcessingErrorKind, Result, Severity};
use crate::visitor::{DocumentVisitor, ElementVisitor, Visitor};

/// Fills [`ProcessingContext::id_map`] and reports duplicate ids.
///
/// A duplicate is a warning and the later element replaces the earlier
/// one in the map. With `strict` set, a duplicate aborts processing.
#[derive(Debug, Clone, Default)]
pub struct IdValidationVisitor {
    strict: bool,
}

impl IdValidationVisitor {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }
}

impl Visitor for IdValidationVisitor {
    fn name(&self) -> &str {
        "id-validation"
    }

    fn priority(&self) -> i32 {
        ID_VALIDATION_PRIORITY
    }

    fn as_document_visitor(&self) -> Option<&dyn DocumentVisitor> {
        Some(self)
    }

    fn as_element_visitor(&self) -> Option<&dyn ElementVisitor> {
        Some(self)
    }
}

#[async_trait]
impl DocumentVisitor for IdValidationVisitor {
    async fn visit_document(
        &self,
        _document: &Document,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Document>> {
        ctx.id_map.clear();
        Ok(None)
    }
}

#[async_trait]
impl ElementVisitor for IdValidationVisitor {
    async fn visit_element(
        &self,
        element: &Element,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Element>> {
        let Some(id) = element.id() else {
            return Ok(None);
        };

        if ctx.id_map.contains_key(id) {
            let error = ProcessingError::new(
                ProcessingErrorKind::DuplicateId,
                format!("Duplicate id '{}' on <{}>", id, element.tag_name),
            )
            .with_span(element.span);

            if self.strict {
                return Err(error.with_severity(Severity::Fatal));
            }
            ctx.report(error, Severity::Warning)?;
        }

        ctx.id_map.insert(id.to_string(), element.clone());
        Ok(None)
    }
}
