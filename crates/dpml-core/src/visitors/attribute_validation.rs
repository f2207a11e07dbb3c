//! Attribute validation against tag schemas.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ATTRIBUTE_VALIDATION_PRIORITY, report_validation};
use crate::ast::Element;
use crate::context::{DocumentMode, ProcessingContext};
use crate::error::{ProcessingError, ProcessingErrorKind, Result, Severity};
use crate::schema::TagSchemaRegistry;
use crate::visitor::{ElementVisitor, Visitor};

/// Attributes the engine itself interprets. They are valid on every tag.
const ENGINE_ATTRIBUTES: [&str; 3] = ["id", "mode", "extends"];

/// Checks element attributes against the registry.
///
/// Findings are errors when the element is in strict mode and warnings
/// otherwise. Unknown attributes are always warnings. Tags the registry
/// does not know are skipped.
pub struct AttributeValidationVisitor {
    registry: Arc<dyn TagSchemaRegistry>,
    strict: bool,
}

impl AttributeValidationVisitor {
    pub fn new(registry: Arc<dyn TagSchemaRegistry>, strict: bool) -> Self {
        Self { registry, strict }
    }
}

impl Visitor for AttributeValidationVisitor {
    fn name(&self) -> &str {
        "attribute-validation"
    }

    fn priority(&self) -> i32 {
        ATTRIBUTE_VALIDATION_PRIORITY
    }

    fn as_element_visitor(&self) -> Option<&dyn ElementVisitor> {
        Some(self)
    }
}

#[async_trait]
impl ElementVisitor for AttributeValidationVisitor {
    async fn visit_element(
        &self,
        element: &Element,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Element>> {
        let Some(definition) = self.registry.tag_definition(&element.tag_name) else {
            return Ok(None);
        };
        let strict = DocumentMode::resolve(Some(element), ctx.document_mode, self.strict).is_strict();
        let tag = &element.tag_name;

        for name in definition.all_required() {
            if !element.has_attr(name) {
                let error = ProcessingError::new(
                    ProcessingErrorKind::MissingRequiredAttribute,
                    format!("Missing required attribute '{}' on <{}>", name, tag),
                )
                .with_span(element.span);
                report_validation(ctx, error, strict)?;
            }
        }

        if let Some(schema) = &definition.attributes {
            for (name, value) in &element.attributes {
                if name.starts_with("x-") || ENGINE_ATTRIBUTES.contains(&name.as_str()) {
                    continue;
                }

                if !schema.contains(name)
                    && !definition.required_attributes.iter().any(|r| r == name)
                {
                    let error = ProcessingError::new(
                        ProcessingErrorKind::UnknownAttribute,
                        format!("Unknown attribute '{}' on <{}>", name, tag),
                    )
                    .with_span(element.span);
                    ctx.report(error, Severity::Warning)?;
                    continue;
                }

                if let Some(spec) = schema.spec(name)
                    && let Some(problem) = spec.check(value)
                {
                    let error = ProcessingError::new(
                        ProcessingErrorKind::InvalidAttribute,
                        format!("Invalid value for '{}' on <{}>: {}", name, tag, problem),
                    )
                    .with_span(element.span);
                    report_validation(ctx, error, strict)?;
                }
            }
        }

        if let Some(validator) = &definition.validator {
            let result = validator.validate(element, ctx);

            for message in &result.errors {
                let error = ProcessingError::new(ProcessingErrorKind::ValidationFailed, message)
                    .with_span(element.span);
                report_validation(ctx, error, strict)?;
            }
            if !result.valid && result.errors.is_empty() {
                let error = ProcessingError::new(
                    ProcessingErrorKind::ValidationFailed,
                    format!("Validation failed for <{}>", tag),
                )
                .with_span(element.span);
                report_validation(ctx, error, strict)?;
            }
            for message in result.warnings {
                let warning = ProcessingError::new(ProcessingErrorKind::ValidationFailed, message)
                    .with_span(element.span);
                ctx.report(warning, Severity::Warning)?;
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Document;
    use crate::error_handler::{ErrorHandler, ErrorHandlerOptions};
    use crate::schema::{InMemoryTagRegistry, TagValidator, ValidationResult};

    const SCHEMA: &str = r#"
role:
  required-attributes: [name]
  attributes:
    name: { type: string }
    temperature: { type: number }
"#;

    fn registry() -> Arc<dyn TagSchemaRegistry> {
        Arc::new(InMemoryTagRegistry::from_yaml_str(SCHEMA).unwrap())
    }

    fn context(recovery: bool) -> ProcessingContext {
        let handler = ErrorHandler::new(ErrorHandlerOptions {
            error_recovery: recovery,
            ..Default::default()
        });
        ProcessingContext::new(Arc::new(Document::default()), "doc.dpml", Arc::new(handler))
    }

    #[tokio::test]
    async fn test_loose_missing_attribute_is_warning() {
        let visitor = AttributeValidationVisitor::new(registry(), false);
        let mut ctx = context(false);

        visitor
            .visit_element(&Element::new("role"), &mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings[0].kind, ProcessingErrorKind::MissingRequiredAttribute);
    }

    #[tokio::test]
    async fn test_element_mode_overrides_visitor_default() {
        let visitor = AttributeValidationVisitor::new(registry(), false);
        let mut ctx = context(false);
        let element = Element::new("role").with_attr("mode", "strict");

        let err = visitor.visit_element(&element, &mut ctx).await.unwrap_err();

        assert_eq!(err.kind, ProcessingErrorKind::MissingRequiredAttribute);
        assert_eq!(err.severity, Severity::Error);
    }

    #[tokio::test]
    async fn test_unknown_engine_and_extension_attributes() {
        let visitor = AttributeValidationVisitor::new(registry(), true);
        let mut ctx = context(false);
        let element = Element::new("role")
            .with_attr("name", "tutor")
            .with_attr("id", "r1")
            .with_attr("mode", "strict")
            .with_attr("x-trace", "1")
            .with_attr("colour", "blue");

        visitor.visit_element(&element, &mut ctx).await.unwrap();

        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings[0].kind, ProcessingErrorKind::UnknownAttribute);
        assert!(ctx.warnings[0].message.contains("colour"));
    }

    #[tokio::test]
    async fn test_type_check_recovers() {
        let visitor = AttributeValidationVisitor::new(registry(), true);
        let mut ctx = context(true);
        let element = Element::new("role")
            .with_attr("name", "tutor")
            .with_attr("temperature", "warm");

        visitor.visit_element(&element, &mut ctx).await.unwrap();

        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].kind, ProcessingErrorKind::InvalidAttribute);
    }

    #[tokio::test]
    async fn test_custom_validator() {
        struct NoEmptyName;
        impl TagValidator for NoEmptyName {
            fn validate(&self, element: &Element, _ctx: &ProcessingContext) -> ValidationResult {
                match element.attr("name") {
                    Some("") => ValidationResult::ok().with_error("name must not be empty"),
                    _ => ValidationResult::ok().with_warning("consider a description"),
                }
            }
        }

        let mut registry = InMemoryTagRegistry::from_yaml_str(SCHEMA).unwrap();
        registry.set_validator("role", Arc::new(NoEmptyName));
        let visitor = AttributeValidationVisitor::new(Arc::new(registry), false);

        let mut ctx = context(false);
        let element = Element::new("role").with_attr("name", "");
        visitor.visit_element(&element, &mut ctx).await.unwrap();
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings[0].kind, ProcessingErrorKind::ValidationFailed);

        let mut ctx = context(false);
        let element = Element::new("role").with_attr("name", "tutor");
        visitor.visit_element(&element, &mut ctx).await.unwrap();
        assert_eq!(ctx.warnings[0].message, "consider a description");
    }

    #[tokio::test]
    async fn test_unknown_tag_skipped() {
        let visitor = AttributeValidationVisitor::new(registry(), true);
        let mut ctx = context(false);

        let out = visitor
            .visit_element(&Element::new("custom").with_attr("anything", "1"), &mut ctx)
            .await
            .unwrap();

        assert!(out.is_none());
        assert!(ctx.warnings.is_empty());
    }
}
