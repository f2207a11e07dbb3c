//! Builder API for diagnostic messages.
//!
//! The builder encodes the tidyverse message structure (title, problem,
//! details, hints) so that call sites read like the message they produce.

use dpml_source_map::SourceLocation;

use crate::diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage};

/// Builder for creating diagnostic messages.
///
/// ```
/// use dpml_error_reporting::DiagnosticMessageBuilder;
///
/// let error = DiagnosticMessageBuilder::error("Missing required attribute")
///     .with_code("D-3-1")
///     .problem("`<role>` requires a `name` attribute")
///     .add_detail("Element declared without `name`")
///     .add_hint("Add `name=\"...\"` to the element?")
///     .build();
///
/// assert_eq!(error.code.as_deref(), Some("D-3-1"));
/// assert_eq!(error.details.len(), 1);
/// assert_eq!(error.hints.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    kind: DiagnosticKind,
    title: String,
    code: Option<String>,
    problem: Option<String>,
    details: Vec<DetailItem>,
    hints: Vec<String>,
    location: Option<SourceLocation>,
}

impl DiagnosticMessageBuilder {
    /// Create a new builder with the specified kind and title.
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            code: None,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            location: None,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    /// Set the error code. Codes follow the format `D-<subsystem>-<number>`.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the problem statement (the "must" or "can't" sentence).
    pub fn problem(mut self, stmt: impl Into<String>) -> Self {
        self.problem = Some(stmt.into());
        self
    }

    /// Add an error detail (✖ bullet).
    pub fn add_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(DetailItem {
            kind: DetailKind::Error,
            content: detail.into(),
        });
        self
    }

    /// Add an info detail (ℹ bullet).
    pub fn add_info(mut self, info: impl Into<String>) -> Self {
        self.details.push(DetailItem {
            kind: DetailKind::Info,
            content: info.into(),
        });
        self
    }

    /// Add a hint for fixing the problem.
    pub fn add_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Attach the source location, if known.
    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    /// Build the diagnostic message.
    pub fn build(self) -> DiagnosticMessage {
        DiagnosticMessage {
            code: self.code,
            title: self.title,
            kind: self.kind,
            problem: self.problem,
            details: self.details,
            hints: self.hints,
            location: self.location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpml_source_map::Span;

    #[test]
    fn test_builder_kinds() {
        assert_eq!(
            DiagnosticMessageBuilder::error("e").build().kind,
            DiagnosticKind::Error
        );
        assert_eq!(
            DiagnosticMessageBuilder::warning("w").build().kind,
            DiagnosticKind::Warning
        );
        assert_eq!(
            DiagnosticMessageBuilder::info("i").build().kind,
            DiagnosticKind::Info
        );
    }

    #[test]
    fn test_builder_details_keep_order() {
        let msg = DiagnosticMessageBuilder::error("Test")
            .add_detail("Detail 1")
            .add_info("Info 1")
            .build();

        assert_eq!(msg.details.len(), 2);
        assert_eq!(msg.details[0].kind, DetailKind::Error);
        assert_eq!(msg.details[1].kind, DetailKind::Info);
    }

    #[test]
    fn test_builder_location() {
        let msg = DiagnosticMessageBuilder::warning("Unknown attribute")
            .with_location(Some(SourceLocation::new(None, Span::default())))
            .build();
        assert!(msg.location.is_some());

        let msg = DiagnosticMessageBuilder::warning("Unknown attribute")
            .with_location(None)
            .build();
        assert!(msg.location.is_none());
    }

    #[test]
    fn test_builder_complete_message() {
        let msg = DiagnosticMessageBuilder::error("Circular reference")
            .with_code("D-2-1")
            .problem("The extends chain loops back on itself")
            .add_detail("id:a -> id:b -> id:a")
            .add_hint("Remove one of the `extends` attributes?")
            .build();

        assert_eq!(msg.title, "Circular reference");
        assert_eq!(msg.code, Some("D-2-1".to_string()));
        assert_eq!(
            msg.problem.as_deref(),
            Some("The extends chain loops back on itself")
        );
        assert_eq!(msg.details.len(), 1);
        assert_eq!(msg.hints.len(), 1);
    }
}
