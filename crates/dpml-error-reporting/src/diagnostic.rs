//! Core diagnostic message types.

use dpml_source_map::SourceLocation;
use serde::{Deserialize, Serialize};

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// An error that prevents completion
    Error,
    /// A warning that doesn't prevent completion but indicates a problem
    Warning,
    /// Informational message
    Info,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Info => "info",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Info => "Info",
        }
    }
}

/// How detail items should be presented (tidyverse x/i bullet style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailKind {
    /// Error detail (✖ bullet)
    Error,
    /// Info detail (ℹ bullet)
    Info,
}

impl DetailKind {
    fn bullet(&self) -> &'static str {
        match self {
            DetailKind::Error => "✖",
            DetailKind::Info => "ℹ",
        }
    }
}

/// A detail item in a diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailItem {
    pub kind: DetailKind,
    pub content: String,
}

/// A diagnostic message following tidyverse-style structure.
///
/// Structure:
/// 1. **Code**: Optional error code (e.g., "D-1-2") for searchability
/// 2. **Title**: Brief error message
/// 3. **Kind**: Error, Warning, Info
/// 4. **Problem**: What went wrong
/// 5. **Details**: Specific information
/// 6. **Hints**: Optional guidance for fixing
/// 7. **Location**: Where in which document the issue was found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    pub title: String,

    pub kind: DiagnosticKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<DetailItem>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl DiagnosticMessage {
    /// Create a new diagnostic message with just a title and kind.
    ///
    /// Prefer [`crate::DiagnosticMessageBuilder`] for anything with details.
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            kind,
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

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the source location.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }

    /// Render this diagnostic message as text following tidyverse style.
    ///
    /// Format:
    /// ```text
    /// Error [D-1-2]: title
    ///   --> doc.dpml:3:5
    /// Problem statement here
    /// ✖ Error detail
    /// ℹ Info detail
    /// ? Hint
    /// ```
    ///
    /// ```
    /// use dpml_error_reporting::DiagnosticMessageBuilder;
    ///
    /// let msg = DiagnosticMessageBuilder::error("Invalid attribute")
    ///     .problem("`temperature` must be a number")
    ///     .add_detail("Found `warm`")
    ///     .build();
    /// let text = msg.to_text();
    /// assert!(text.starts_with("Error: Invalid attribute"));
    /// assert!(text.contains("✖ Found `warm`"));
    /// ```
    pub fn to_text(&self) -> String {
        use std::fmt::Write;

        let mut result = String::new();

        match &self.code {
            Some(code) => {
                let _ = writeln!(result, "{} [{}]: {}", self.kind.label(), code, self.title);
            }
            None => {
                let _ = writeln!(result, "{}: {}", self.kind.label(), self.title);
            }
        }

        if let Some(location) = &self.location {
            let _ = writeln!(result, "  --> {}", location);
        }

        if let Some(problem) = &self.problem {
            let _ = writeln!(result, "{}", problem);
        }

        for detail in &self.details {
            let _ = writeln!(result, "{} {}", detail.kind.bullet(), detail.content);
        }

        for hint in &self.hints {
            let _ = writeln!(result, "? {}", hint);
        }

        result
    }

    /// Render this diagnostic message as a JSON value.
    ///
    /// ```
    /// use dpml_error_reporting::DiagnosticMessage;
    ///
    /// let msg = DiagnosticMessage::warning("Unknown attribute").with_code("D-3-3");
    /// let json = msg.to_json();
    /// assert_eq!(json["kind"], "warning");
    /// assert_eq!(json["code"], "D-3-3");
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "kind": self.kind.as_str(),
                "title": self.title,
            })
        })
    }
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text().trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpml_source_map::{Location, Span};

    #[test]
    fn test_diagnostic_message_new() {
        let msg = DiagnosticMessage::new(DiagnosticKind::Error, "Test error");
        assert_eq!(msg.title, "Test error");
        assert_eq!(msg.kind, DiagnosticKind::Error);
        assert!(msg.code.is_none());
        assert!(msg.problem.is_none());
        assert!(msg.details.is_empty());
        assert!(msg.location.is_none());
    }

    #[test]
    fn test_diagnostic_message_constructors() {
        assert!(DiagnosticMessage::error("Error").is_error());
        assert_eq!(
            DiagnosticMessage::warning("Warning").kind,
            DiagnosticKind::Warning
        );
        assert_eq!(DiagnosticMessage::info("Info").kind, DiagnosticKind::Info);
    }

    #[test]
    fn test_to_text_with_location() {
        let location = SourceLocation::new(
            Some("agent.dpml".to_string()),
            Span::new(Location::new(40, 3, 5), Location::new(52, 3, 17)),
        );
        let msg = DiagnosticMessage::error("Reference not found")
            .with_code("D-1-2")
            .with_location(location);

        let text = msg.to_text();
        assert!(text.contains("Error [D-1-2]: Reference not found"));
        assert!(text.contains("--> agent.dpml:3:5"));
    }

    #[test]
    fn test_to_json_roundtrip_shape() {
        let msg = DiagnosticMessage::warning("Duplicate id").with_code("D-3-5");
        let json = msg.to_json();

        assert_eq!(json["kind"], "warning");
        assert_eq!(json["title"], "Duplicate id");
        assert!(json.get("details").is_none());
        assert!(json.get("location").is_none());
    }

    #[test]
    fn test_display_trims_trailing_newline() {
        let msg = DiagnosticMessage::info("Processing complete");
        assert_eq!(msg.to_string(), "Info: Processing complete");
    }
}
