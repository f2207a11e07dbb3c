//! Parent/child tag constraints.

use std::sync::Arc;

use async_trait::async_trait;

use super::{NESTING_VALIDATION_PRIORITY, report_validation};
use crate::ast::Element;
use crate::context::{DocumentMode, ProcessingContext};
use crate::error::{ProcessingError, ProcessingErrorKind, Result};
use crate::schema::TagSchemaRegistry;
use crate::visitor::{ElementVisitor, Visitor};

/// Checks each element against `allowed-children` of its parent's schema.
pub struct NestingValidationVisitor {
    registry: Arc<dyn TagSchemaRegistry>,
    strict: bool,
}

impl NestingValidationVisitor {
    pub fn new(registry: Arc<dyn TagSchemaRegistry>, strict: bool) -> Self {
        Self { registry, strict }
    }
}

impl Visitor for NestingValidationVisitor {
    fn name(&self) -> &str {
        "nesting-validation"
    }

    fn priority(&self) -> i32 {
        NESTING_VALIDATION_PRIORITY
    }

    fn as_element_visitor(&self) -> Option<&dyn ElementVisitor> {
        Some(self)
    }
}

#[async_trait]
impl ElementVisitor for NestingValidationVisitor {
    async fn visit_element(
        &self,
        element: &Element,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Element>> {
        let Some(parent) = ctx.parent() else {
            return Ok(None);
        };
        let Some(definition) = self.registry.tag_definition(&parent.tag_name) else {
            return Ok(None);
        };
        if definition.allows_child(&element.tag_name) {
            return Ok(None);
        }

        let message = format!(
            "<{}> is not allowed inside <{}>",
            element.tag_name, parent.tag_name
        );
        let strict = DocumentMode::resolve(Some(element), ctx.document_mode, self.strict).is_strict();
        let error = ProcessingError::new(ProcessingErrorKind::InvalidNesting, message)
            .with_span(element.span);
        report_validation(ctx, error, strict)?;
        Ok(None)
    }
}
