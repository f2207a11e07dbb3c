/*
 * error_handler.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Severity routing for processing failures.
 */

//! Error handler.
//!
//! The handler decides what a [`ProcessingError`] does to the run:
//!
//! | Severity | Callback     | Outcome                                     |
//! |----------|--------------|---------------------------------------------|
//! | Warning  | `on_warning` | recorded, processing continues              |
//! | Error    | `on_error`   | returned as `Err` unless recovery is on     |
//! | Fatal    | `on_error`   | always returned as `Err`                    |
//!
//! With `strict_mode` set, `Error` is escalated to `Fatal` before dispatch.
//! [`ErrorHandler::handle_with_context`] derives the severity from the
//! document mode instead, so different subtrees of one document can have
//! different failure tolerance.

use std::fmt;
use std::sync::Arc;

use crate::ast::Element;
use crate::context::{DocumentMode, ProcessingContext};
use crate::error::{ProcessingError, Result, Severity};

/// Callback invoked with each reported error or warning.
pub type ErrorCallback = Arc<dyn Fn(&ProcessingError) + Send + Sync>;

/// Configuration for [`ErrorHandler`].
#[derive(Clone, Default)]
pub struct ErrorHandlerOptions {
    /// Escalate `Error` to `Fatal`, and treat documents without a declared
    /// mode as strict.
    pub strict_mode: bool,

    /// Record `Error`s and keep going instead of aborting.
    pub error_recovery: bool,

    /// Called for `Error` and `Fatal`. Defaults to `tracing::error!`.
    pub on_error: Option<ErrorCallback>,

    /// Called for `Warning`. Defaults to `tracing::warn!`.
    pub on_warning: Option<ErrorCallback>,
}

impl fmt::Debug for ErrorHandlerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlerOptions")
            .field("strict_mode", &self.strict_mode)
            .field("error_recovery", &self.error_recovery)
            .field("on_error", &self.on_error.is_some())
            .field("on_warning", &self.on_warning.is_some())
            .finish()
    }
}

/// Classifies and routes failures by severity.
#[derive(Debug, Clone, Default)]
pub struct ErrorHandler {
    options: ErrorHandlerOptions,
}

impl ErrorHandler {
    pub fn new(options: ErrorHandlerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ErrorHandlerOptions {
        &self.options
    }

    /// Mode used when neither the element nor the document declares one.
    pub fn default_strict(&self) -> bool {
        self.options.strict_mode
    }

    /// Handle `error` at `severity`.
    ///
    /// Returns `Ok(())` when processing may continue. The path of the
    /// document being processed is attached when the error has none.
    pub fn handle_error(
        &self,
        error: ProcessingError,
        severity: Severity,
        ctx: &mut ProcessingContext,
    ) -> Result<()> {
        let severity = if self.options.strict_mode && severity == Severity::Error {
            Severity::Fatal
        } else {
            severity
        };
        self.dispatch(error, severity, ctx)
    }

    /// Handle `error` with severity derived from the mode at `element`:
    /// strict gives `Error`, loose gives `Warning`.
    pub fn handle_with_context(
        &self,
        error: ProcessingError,
        element: Option<&Element>,
        ctx: &mut ProcessingContext,
    ) -> Result<()> {
        let severity = match self.mode_from_context(element, ctx) {
            DocumentMode::Strict => Severity::Error,
            DocumentMode::Loose => Severity::Warning,
        };
        self.handle_error(error, severity, ctx)
    }

    /// Handle a failure that escaped a visitor.
    ///
    /// The error keeps its own severity, but a strict `mode` escalates
    /// `Error` to `Fatal` the way global strict mode does. Errors the
    /// handler already reported are passed through untouched.
    pub fn handle_in_mode(
        &self,
        error: ProcessingError,
        mode: DocumentMode,
        ctx: &mut ProcessingContext,
    ) -> Result<()> {
        if error.reported {
            return Err(error);
        }
        let severity = match error.severity {
            Severity::Error if mode.is_strict() => Severity::Fatal,
            severity => severity,
        };
        self.dispatch(error, severity, ctx)
    }

    /// Mode applying at `element`: its own `mode`, else the context's
    /// current mode, else this handler's default.
    pub fn mode_from_context(
        &self,
        element: Option<&Element>,
        ctx: &ProcessingContext,
    ) -> DocumentMode {
        DocumentMode::resolve(element, ctx.document_mode, self.options.strict_mode)
    }

    fn dispatch(
        &self,
        mut error: ProcessingError,
        severity: Severity,
        ctx: &mut ProcessingContext,
    ) -> Result<()> {
        error.severity = severity;
        if error.path.is_none() && !ctx.path.is_empty() {
            error.path = Some(ctx.path.clone());
        }
        if error.code.is_none() {
            error.code = Some(error.kind.code().to_string());
        }

        match severity {
            Severity::Warning => {
                self.notify_warning(&error);
                ctx.record_warning(error);
                Ok(())
            }
            Severity::Error => {
                self.notify_error(&error);
                if self.options.error_recovery {
                    ctx.record_error(error);
                    Ok(())
                } else {
                    error.reported = true;
                    Err(error)
                }
            }
            Severity::Fatal => {
                self.notify_error(&error);
                error.reported = true;
                Err(error)
            }
        }
    }

    fn notify_warning(&self, error: &ProcessingError) {
        match &self.options.on_warning {
            Some(callback) => callback(error),
            None => tracing::warn!(code = error.code(), "{}", error),
        }
    }

    fn notify_error(&self, error: &ProcessingError) {
        match &self.options.on_error {
            Some(callback) => callback(error),
            None => tracing::error!(
                code = error.code(),
                severity = %error.severity,
                "{}",
                error
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Document;
    use crate::error::ProcessingErrorKind;
    use std::sync::Mutex;

    struct Recorded {
        errors: Arc<Mutex<Vec<String>>>,
        warnings: Arc<Mutex<Vec<String>>>,
    }

    fn handler(strict_mode: bool, error_recovery: bool) -> (Arc<ErrorHandler>, Recorded) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let e = errors.clone();
        let w = warnings.clone();
        let handler = ErrorHandler::new(ErrorHandlerOptions {
            strict_mode,
            error_recovery,
            on_error: Some(Arc::new(move |err| e.lock().unwrap().push(err.message.clone()))),
            on_warning: Some(Arc::new(move |err| {
                w.lock().unwrap().push(err.message.clone())
            })),
        });
        (Arc::new(handler), Recorded { errors, warnings })
    }

    fn context(handler: &Arc<ErrorHandler>) -> ProcessingContext {
        ProcessingContext::new(Arc::new(Document::default()), "doc.dpml", handler.clone())
    }

    fn invalid(message: &str) -> ProcessingError {
        ProcessingError::new(ProcessingErrorKind::InvalidAttribute, message)
    }

    #[test]
    fn test_warning_never_throws() {
        let (handler, recorded) = handler(true, false);
        let mut ctx = context(&handler);

        handler
            .handle_error(invalid("w"), Severity::Warning, &mut ctx)
            .unwrap();

        assert_eq!(*recorded.warnings.lock().unwrap(), vec!["w"]);
        assert!(recorded.errors.lock().unwrap().is_empty());
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings[0].code.as_deref(), Some("D-3-2"));
    }

    #[test]
    fn test_error_throws_without_recovery() {
        let (handler, recorded) = handler(false, false);
        let mut ctx = context(&handler);

        let err = handler
            .handle_error(invalid("e"), Severity::Error, &mut ctx)
            .unwrap_err();

        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.path.as_deref(), Some("doc.dpml"));
        assert_eq!(recorded.errors.lock().unwrap().len(), 1);
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn test_error_recorded_with_recovery() {
        let (handler, _recorded) = handler(false, true);
        let mut ctx = context(&handler);

        handler
            .handle_error(invalid("e"), Severity::Error, &mut ctx)
            .unwrap();

        assert_eq!(ctx.errors.len(), 1);
    }

    #[test]
    fn test_strict_mode_escalates_to_fatal() {
        let (handler, _recorded) = handler(true, true);
        let mut ctx = context(&handler);

        let err = handler
            .handle_error(invalid("e"), Severity::Error, &mut ctx)
            .unwrap_err();

        assert_eq!(err.severity, Severity::Fatal);
        assert!(ctx.errors.is_empty());
    }

    #[test]
    fn test_fatal_ignores_recovery() {
        let (handler, recorded) = handler(false, true);
        let mut ctx = context(&handler);

        let result = handler.handle_error(invalid("f"), Severity::Fatal, &mut ctx);

        assert!(result.is_err());
        assert_eq!(*recorded.errors.lock().unwrap(), vec!["f"]);
    }

    #[test]
    fn test_with_context_uses_element_mode() {
        let (handler, _recorded) = handler(false, false);
        let mut ctx = context(&handler);
        ctx.document_mode = Some(DocumentMode::Loose);

        let strict_el = Element::new("role").with_attr("mode", "strict");
        let err = handler
            .handle_with_context(invalid("strict"), Some(&strict_el), &mut ctx)
            .unwrap_err();
        assert_eq!(err.severity, Severity::Error);

        let plain_el = Element::new("role");
        handler
            .handle_with_context(invalid("loose"), Some(&plain_el), &mut ctx)
            .unwrap();
        assert_eq!(ctx.warnings.len(), 1);
    }

    #[test]
    fn test_with_context_loose_document_overrides_global_strict() {
        let (handler, _recorded) = handler(true, false);
        let mut ctx = context(&handler);
        ctx.document_mode = Some(DocumentMode::Loose);

        handler
            .handle_with_context(invalid("advisory"), None, &mut ctx)
            .unwrap();
        assert_eq!(ctx.warnings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_handle_in_mode() {
        let (handler, _recorded) = handler(false, true);
        let mut ctx = context(&handler);

        handler
            .handle_in_mode(invalid("loose"), DocumentMode::Loose, &mut ctx)
            .unwrap();
        assert_eq!(ctx.errors.len(), 1);

        let err = handler
            .handle_in_mode(invalid("strict"), DocumentMode::Strict, &mut ctx)
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.is_reported());
    }

    #[test]
    fn test_reported_error_is_not_dispatched_twice() {
        let (handler, recorded) = handler(false, false);
        let mut ctx = context(&handler);

        let err = handler
            .handle_error(invalid("once"), Severity::Error, &mut ctx)
            .unwrap_err();
        let err = handler
            .handle_in_mode(err, DocumentMode::Strict, &mut ctx)
            .unwrap_err();

        assert_eq!(err.severity, Severity::Error);
        assert_eq!(recorded.errors.lock().unwrap().len(), 1);
    }
}
