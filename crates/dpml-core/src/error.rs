//! Error types for dpml-core
//!
//! Every failure during processing is a [`ProcessingError`]: a kind from the
//! fixed taxonomy plus severity, source span, document path, catalog code
//! and an optional cause. Whether it aborts the run is decided by the
//! [`ErrorHandler`](crate::error_handler::ErrorHandler), not by the code
//! that raised it.

use std::fmt;
use std::sync::Arc;

use dpml_error_reporting::{DiagnosticMessage, DiagnosticMessageBuilder};
use dpml_source_map::{SourceLocation, Span};
use thiserror::Error;

/// How serious a failure is. Ordered `Warning < Error < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Reported, never interrupts processing
    Warning,
    /// Interrupts processing unless error recovery is enabled
    Error,
    /// Always interrupts processing
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The taxonomy of processing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingErrorKind {
    UnsupportedProtocol,
    ReferenceNotFound,
    ReferenceResolutionFailed,
    CircularReference,
    UnsupportedInheritance,
    MissingRequiredAttribute,
    InvalidAttribute,
    UnknownAttribute,
    InvalidNesting,
    DuplicateId,
    ValidationFailed,
    Other,
}

impl ProcessingErrorKind {
    /// Catalog code in `dpml-error-reporting`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Other => "D-0-1",
            Self::UnsupportedProtocol => "D-1-1",
            Self::ReferenceNotFound => "D-1-2",
            Self::ReferenceResolutionFailed => "D-1-3",
            Self::CircularReference => "D-2-1",
            Self::UnsupportedInheritance => "D-2-2",
            Self::MissingRequiredAttribute => "D-3-1",
            Self::InvalidAttribute => "D-3-2",
            Self::UnknownAttribute => "D-3-3",
            Self::InvalidNesting => "D-3-4",
            Self::DuplicateId => "D-3-5",
            Self::ValidationFailed => "D-3-6",
        }
    }
}

/// A failure raised while processing a document.
#[derive(Debug, Clone)]
pub struct ProcessingError {
    pub kind: ProcessingErrorKind,
    pub message: String,
    pub severity: Severity,
    pub span: Option<Span>,
    pub path: Option<String>,
    pub code: Option<String>,
    pub cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
    /// Set once the error handler has dispatched this error.
    pub(crate) reported: bool,
}

impl ProcessingError {
    /// Create an error of `kind` at [`Severity::Error`].
    pub fn new(kind: ProcessingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity: Severity::Error,
            span: None,
            path: None,
            code: None,
            cause: None,
            reported: false,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProcessingErrorKind::Other, message)
    }

    pub fn unsupported_protocol(protocol: &str) -> Self {
        Self::new(
            ProcessingErrorKind::UnsupportedProtocol,
            format!("No handler registered for protocol '{}'", protocol),
        )
        .with_severity(Severity::Fatal)
    }

    pub fn reference_not_found(target: &str) -> Self {
        Self::new(
            ProcessingErrorKind::ReferenceNotFound,
            format!("Reference target '{}' not found", target),
        )
    }

    pub fn circular_reference(chain: &[String], repeated: &str) -> Self {
        let mut path: Vec<&str> = chain.iter().map(String::as_str).collect();
        path.push(repeated);
        Self::new(
            ProcessingErrorKind::CircularReference,
            format!("Circular inheritance detected: {}", path.join(" -> ")),
        )
        .with_severity(Severity::Fatal)
    }

    pub fn unsupported_inheritance(extends: &str) -> Self {
        Self::new(
            ProcessingErrorKind::UnsupportedInheritance,
            format!("Cannot inherit from '{}': unsupported scheme", extends),
        )
        .with_severity(Severity::Fatal)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// The explicit code, or the catalog code of the kind.
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or_else(|| self.kind.code())
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Whether the error handler already notified callbacks about this
    /// error. Reported errors propagate without being handled again.
    pub fn is_reported(&self) -> bool {
        self.reported
    }

    pub fn location(&self) -> Option<SourceLocation> {
        self.span
            .map(|span| SourceLocation::new(self.path.clone(), span))
    }

    /// Convert to a diagnostic for reporting.
    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        let title = dpml_error_reporting::get_title(self.code())
            .unwrap_or("Processing error")
            .to_string();
        let builder = match self.severity {
            Severity::Warning => DiagnosticMessageBuilder::warning(title),
            Severity::Error | Severity::Fatal => DiagnosticMessageBuilder::error(title),
        };
        let mut builder = builder
            .with_code(self.code())
            .problem(self.message.clone())
            .with_location(self.location());
        if let Some(cause) = &self.cause {
            builder = builder.add_info(format!("Caused by: {}", cause));
        }
        builder.build()
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match (&self.path, &self.span) {
            (Some(path), Some(span)) => write!(f, " at {}:{}", path, span.start),
            (Some(path), None) => write!(f, " in {}", path),
            (None, Some(span)) => write!(f, " at {}", span.start),
            (None, None) => Ok(()),
        }
    }
}

impl std::error::Error for ProcessingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| &**cause as &(dyn std::error::Error + 'static))
    }
}

/// Failure reported by a protocol handler.
///
/// The resolver maps [`ProtocolError::NotFound`] and
/// [`ProtocolError::FileNotFound`] to
/// [`ProcessingErrorKind::ReferenceNotFound`] and everything else to
/// [`ProcessingErrorKind::ReferenceResolutionFailed`].
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Permission denied reading {0}")]
    PermissionDenied(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
