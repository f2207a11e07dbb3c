/*
 * visitors/content_references.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Inline `@reference` substitution in text content.
 */

//! Content references.
//!
//! Text may embed references as `@protocol:path`, or `@path` for `id:`.
//! Each occurrence is resolved left to right and replaced by the rendered
//! value. An occurrence that fails to resolve is left in place and reported
//! as a warning; the content node itself never fails.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use super::CONTENT_REFERENCE_PRIORITY;
use crate::ast::{Content, Reference};
use crate::context::ProcessingContext;
use crate::error::{Result, Severity};
use crate::reference::ReferenceResolver;
use crate::visitor::{ContentVisitor, Visitor};

/// `@` must start the text or follow a character that cannot be part of a
/// word or another reference, so e-mail addresses are not matched.
static CONTENT_REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // (^|[^\w@])                    - start, or a separator (group 1)
    // @                             - marker
    // (?:([A-Za-z][\w+.-]*):)?      - optional protocol (group 2)
    // ([^\s<>"'`@,;]+)              - path (group 3)
    Regex::new(r#"(^|[^\w@])@(?:([A-Za-z][\w+.-]*):)?([^\s<>"'`@,;]+)"#)
        .expect("Invalid regex pattern for content references")
});

/// Punctuation that ends a sentence rather than a path.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

/// One `@reference` found in text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Occurrence {
    /// Byte range of the `@...` text, trailing punctuation excluded.
    start: usize,
    end: usize,
    protocol: String,
    path: String,
}

fn find_occurrences(text: &str) -> Vec<Occurrence> {
    CONTENT_REFERENCE_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let lead = caps.get(1)?;
            let raw = caps.get(3)?;
            let path = raw.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            if path.is_empty() {
                return None;
            }
            let protocol = caps.get(2).map_or("id", |m| m.as_str());
            Some(Occurrence {
                start: lead.end(),
                end: raw.start() + path.len(),
                protocol: protocol.to_string(),
                path: path.to_string(),
            })
        })
        .collect()
}

/// Substitutes `@references` in [`Content`] nodes.
pub struct ContentReferenceVisitor {
    resolver: Arc<ReferenceResolver>,
}

impl ContentReferenceVisitor {
    pub fn new(resolver: Arc<ReferenceResolver>) -> Self {
        Self { resolver }
    }
}

impl Visitor for ContentReferenceVisitor {
    fn name(&self) -> &str {
        "content-references"
    }

    fn priority(&self) -> i32 {
        CONTENT_REFERENCE_PRIORITY
    }

    fn as_content_visitor(&self) -> Option<&dyn ContentVisitor> {
        Some(self)
    }
}

#[async_trait]
impl ContentVisitor for ContentReferenceVisitor {
    async fn visit_content(
        &self,
        content: &Content,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Content>> {
        let text = content.value.as_str();
        let occurrences = find_occurrences(text);
        if occurrences.is_empty() {
            return Ok(None);
        }

        let mut output = String::with_capacity(text.len());
        let mut cursor = 0;
        let mut replaced = false;

        for occurrence in occurrences {
            output.push_str(&text[cursor..occurrence.start]);
            cursor = occurrence.end;

            let mut reference = Reference::new(occurrence.protocol, occurrence.path);
            reference.span = content.span;

            match self.resolver.resolve(&reference, ctx).await {
                Ok(value) => {
                    output.push_str(&value.to_text());
                    replaced = true;
                }
                Err(error) => {
                    tracing::warn!(
                        reference = %reference.cache_key(),
                        error = %error,
                        "Leaving unresolved content reference in place"
                    );
                    output.push_str(&text[occurrence.start..occurrence.end]);
                    ctx.report(error, Severity::Warning)?;
                }
            }
        }
        output.push_str(&text[cursor..]);

        if !replaced {
            return Ok(None);
        }
        Ok(Some(Content {
            value: output,
            ..content.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Document, Element, Node, ReferenceValue};
    use crate::error::{ProcessingErrorKind, ProtocolError};
    use crate::error_handler::ErrorHandler;
    use crate::reference::{FileProtocolHandler, ProtocolHandler};
    use serde_json::json;

    struct JsonHandler;

    #[async_trait]
    impl ProtocolHandler for JsonHandler {
        fn name(&self) -> &str {
            "data"
        }

        fn can_handle(&self, protocol: &str) -> bool {
            protocol == "data"
        }

        async fn handle(
            &self,
            reference: &Reference,
            _ctx: &ProcessingContext,
        ) -> std::result::Result<ReferenceValue, ProtocolError> {
            match reference.path.as_str() {
                "name" => Ok(ReferenceValue::Json(json!("Ada"))),
                "count" => Ok(ReferenceValue::Json(json!(3))),
                "flag" => Ok(ReferenceValue::Json(json!(false))),
                "obj" => Ok(ReferenceValue::Json(json!({"k": [1, 2]}))),
                other => Err(ProtocolError::NotFound(other.to_string())),
            }
        }
    }

    fn visitor() -> ContentReferenceVisitor {
        let mut resolver = ReferenceResolver::with_id_handler();
        resolver.register_handler(Arc::new(FileProtocolHandler::new()));
        resolver.register_handler(Arc::new(JsonHandler));
        ContentReferenceVisitor::new(Arc::new(resolver))
    }

    fn context() -> ProcessingContext {
        let doc = Document::new(vec![Node::Element(
            Element::new("prompt").with_attr("id", "root"),
        )]);
        ProcessingContext::new(Arc::new(doc), "doc.dpml", Arc::new(ErrorHandler::default()))
    }

    #[test]
    fn test_find_occurrences() {
        let found = find_occurrences("See @intro, then @file:./a.txt. Mail me@example.com");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].protocol, "id");
        assert_eq!(found[0].path, "intro");
        assert_eq!(found[1].protocol, "file");
        assert_eq!(found[1].path, "./a.txt");

        let text = "(@data:name)";
        let found = find_occurrences(text);
        assert_eq!(&text[found[0].start..found[0].end], "@data:name");
    }

    #[test]
    fn test_adjacent_occurrences_split() {
        let keys: Vec<String> = find_occurrences("@a,@b and @c;@d")
            .iter()
            .map(|o| format!("{}:{}", o.protocol, o.path))
            .collect();
        assert_eq!(keys, vec!["id:a", "id:b", "id:c", "id:d"]);
    }

    #[tokio::test]
    async fn test_adjacent_references_resolve_independently() {
        let mut ctx = context();
        let content = Content::new("@data:name,@data:count;@data:flag");

        let out = visitor()
            .visit_content(&content, &mut ctx)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.value, "Ada,3;false");
        assert!(ctx.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_substitutes_values_by_type() {
        let mut ctx = context();
        let content = Content::new("@data:name has @data:count items, ok=@data:flag, @data:obj");

        let out = visitor()
            .visit_content(&content, &mut ctx)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.value, r#"Ada has 3 items, ok=false, {"k":[1,2]}"#);
        assert!(ctx.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failure_leaves_text_and_warns() {
        let mut ctx = context();
        let content = Content::new("Hi @data:name, see @data:missing.");

        let out = visitor()
            .visit_content(&content, &mut ctx)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(out.value, "Hi Ada, see @data:missing.");
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings[0].kind, ProcessingErrorKind::ReferenceNotFound);
    }

    #[tokio::test]
    async fn test_unsupported_protocol_only_warns() {
        let mut ctx = context();
        let content = Content::new("Ping @slack:general");

        let out = visitor().visit_content(&content, &mut ctx).await.unwrap();

        assert!(out.is_none());
        assert_eq!(ctx.warnings.len(), 1);
        assert_eq!(ctx.warnings[0].kind, ProcessingErrorKind::UnsupportedProtocol);
    }

    #[tokio::test]
    async fn test_plain_text_untouched() {
        let mut ctx = context();
        let out = visitor()
            .visit_content(&Content::new("nothing to see"), &mut ctx)
            .await
            .unwrap();
        assert!(out.is_none());
    }
}
