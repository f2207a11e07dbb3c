/*
 * reference/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Protocol-pluggable reference resolution.
 */

//! Reference resolution.
//!
//! A [`ReferenceResolver`] owns a list of [`ProtocolHandler`]s and resolves
//! `protocol:path` references through them. Results are cached in
//! [`ProcessingContext::resolved_references`] so a resource is fetched at
//! most once per run.
//!
//! Built-in handlers:
//!
//! - [`IdProtocolHandler`] (`id:`)
//! - [`FileProtocolHandler`] (`file:`)
//! - [`HttpProtocolHandler`] (`http:`, `https:`)

mod file;
mod http;
mod id;

use std::sync::Arc;

use async_trait::async_trait;

pub use file::FileProtocolHandler;
pub use http::{DEFAULT_TIMEOUT_MS, HttpOptions, HttpProtocolHandler};
pub use id::IdProtocolHandler;

use crate::ast::{Reference, ReferenceValue, ResolvedReference};
use crate::context::ProcessingContext;
use crate::error::{ProcessingError, ProcessingErrorKind, ProtocolError, Result};

/// Resolves references for one or more protocols.
///
/// Handlers only read the context. Caching and error classification are
/// the resolver's job.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Name used in log fields.
    fn name(&self) -> &str;

    fn can_handle(&self, protocol: &str) -> bool;

    async fn handle(
        &self,
        reference: &Reference,
        ctx: &ProcessingContext,
    ) -> std::result::Result<ReferenceValue, ProtocolError>;
}

/// Dispatches references to protocol handlers and caches the results.
pub struct ReferenceResolver {
    handlers: Vec<Arc<dyn ProtocolHandler>>,
    cache_enabled: bool,
}

impl ReferenceResolver {
    /// An empty resolver with caching on.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            cache_enabled: true,
        }
    }

    /// A resolver with the `id:` handler registered.
    pub fn with_id_handler() -> Self {
        let mut resolver = Self::new();
        resolver.register_handler(Arc::new(IdProtocolHandler));
        resolver
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Register a handler. When several handlers accept a protocol the
    /// most recently registered one is used.
    pub fn register_handler(&mut self, handler: Arc<dyn ProtocolHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_for(&self, protocol: &str) -> Option<&Arc<dyn ProtocolHandler>> {
        self.handlers
            .iter()
            .rev()
            .find(|handler| handler.can_handle(protocol))
    }

    /// Resolve `reference`, consulting and filling the context cache.
    ///
    /// # Errors
    ///
    /// - `UnsupportedProtocol` (fatal) when no handler accepts the protocol
    /// - `ReferenceNotFound` when the handler reports a missing target
    /// - `ReferenceResolutionFailed` for any other handler failure
    pub async fn resolve(
        &self,
        reference: &Reference,
        ctx: &mut ProcessingContext,
    ) -> Result<ReferenceValue> {
        let key = reference.cache_key();

        if self.cache_enabled
            && let Some(cached) = ctx.resolved_references.get(&key)
        {
            tracing::debug!(reference = %key, "Reference cache hit");
            return Ok(cached.value.clone());
        }

        let handler = self.handler_for(&reference.protocol).ok_or_else(|| {
            ProcessingError::unsupported_protocol(&reference.protocol).with_span(reference.span)
        })?;

        tracing::debug!(
            reference = %key,
            handler = handler.name(),
            "Resolving reference"
        );

        let value = handler
            .handle(reference, ctx)
            .await
            .map_err(|err| classify(err, reference))?;

        if self.cache_enabled {
            ctx.resolved_references.insert(
                key,
                ResolvedReference {
                    reference: reference.clone(),
                    value: value.clone(),
                },
            );
        }

        Ok(value)
    }
}

impl Default for ReferenceResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn classify(err: ProtocolError, reference: &Reference) -> ProcessingError {
    let kind = match err {
        ProtocolError::NotFound(_) | ProtocolError::FileNotFound(_) => {
            ProcessingErrorKind::ReferenceNotFound
        }
        _ => ProcessingErrorKind::ReferenceResolutionFailed,
    };
    let message = format!("Failed to resolve '{}': {}", reference.cache_key(), err);
    ProcessingError::new(kind, message)
        .with_span(reference.span)
        .with_cause(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Document;
    use crate::error::Severity;
    use crate::error_handler::ErrorHandler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        label: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProtocolHandler for CountingHandler {
        fn name(&self) -> &str {
            self.label
        }

        fn can_handle(&self, protocol: &str) -> bool {
            protocol == "test"
        }

        async fn handle(
            &self,
            reference: &Reference,
            _ctx: &ProcessingContext,
        ) -> std::result::Result<ReferenceValue, ProtocolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match reference.path.as_str() {
                "missing" => Err(ProtocolError::NotFound("missing".into())),
                "broken" => Err(ProtocolError::Other("backend down".into())),
                path => Ok(ReferenceValue::Text(format!("{}:{}", self.label, path))),
            }
        }
    }

    fn context() -> ProcessingContext {
        ProcessingContext::new(
            Arc::new(Document::default()),
            "doc.dpml",
            Arc::new(ErrorHandler::default()),
        )
    }

    fn counting(label: &'static str) -> (Arc<dyn ProtocolHandler>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            label,
            calls: calls.clone(),
        };
        (Arc::new(handler), calls)
    }

    #[tokio::test]
    async fn test_cache_calls_handler_once() {
        let (handler, calls) = counting("h");
        let mut resolver = ReferenceResolver::new();
        resolver.register_handler(handler);
        let mut ctx = context();

        let reference = Reference::new("test", "value");
        for _ in 0..3 {
            resolver.resolve(&reference, &mut ctx).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(ctx.resolved_references.contains_key("test:value"));
    }

    #[tokio::test]
    async fn test_cache_disabled_calls_every_time() {
        let (handler, calls) = counting("h");
        let mut resolver = ReferenceResolver::new().with_cache(false);
        resolver.register_handler(handler);
        let mut ctx = context();

        let reference = Reference::new("test", "value");
        for _ in 0..3 {
            resolver.resolve(&reference, &mut ctx).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(ctx.resolved_references.is_empty());
    }

    #[tokio::test]
    async fn test_last_registered_handler_wins() {
        let (first, first_calls) = counting("first");
        let (second, _) = counting("second");
        let mut resolver = ReferenceResolver::new();
        resolver.register_handler(first);
        resolver.register_handler(second);
        let mut ctx = context();

        let value = resolver
            .resolve(&Reference::new("test", "x"), &mut ctx)
            .await
            .unwrap();

        assert_eq!(value, ReferenceValue::Text("second:x".into()));
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unsupported_protocol_is_fatal() {
        let resolver = ReferenceResolver::new();
        let mut ctx = context();

        let err = resolver
            .resolve(&Reference::new("ftp", "x"), &mut ctx)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ProcessingErrorKind::UnsupportedProtocol);
        assert_eq!(err.severity, Severity::Fatal);
    }

    #[tokio::test]
    async fn test_handler_errors_are_classified() {
        let (handler, _) = counting("h");
        let mut resolver = ReferenceResolver::new();
        resolver.register_handler(handler);
        let mut ctx = context();

        let err = resolver
            .resolve(&Reference::new("test", "missing"), &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProcessingErrorKind::ReferenceNotFound);
        assert_eq!(err.severity, Severity::Error);

        let err = resolver
            .resolve(&Reference::new("test", "broken"), &mut ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProcessingErrorKind::ReferenceResolutionFailed);
        assert!(err.message.contains("backend down"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
