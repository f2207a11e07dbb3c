//! `id:` references.

use async_trait::async_trait;

use super::ProtocolHandler;
use crate::ast::{Node, Reference, ReferenceValue};
use crate::context::ProcessingContext;
use crate::error::ProtocolError;

/// Resolves `id:<id>` to the element carrying that id.
///
/// Elements collected so far are checked first. Ids the traversal has not
/// reached yet are found by searching the input document.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdProtocolHandler;

#[async_trait]
impl ProtocolHandler for IdProtocolHandler {
    fn name(&self) -> &str {
        "id"
    }

    fn can_handle(&self, protocol: &str) -> bool {
        protocol == "id"
    }

    async fn handle(
        &self,
        reference: &Reference,
        ctx: &ProcessingContext,
    ) -> Result<ReferenceValue, ProtocolError> {
        ctx.find_element(&reference.path)
            .map(|element| ReferenceValue::Node(Box::new(Node::Element(element.clone()))))
            .ok_or_else(|| {
                ProtocolError::NotFound(format!("Element with id '{}'", reference.path))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Document, Element};
    use crate::error_handler::ErrorHandler;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_resolves_known_and_forward_ids() {
        let document = Document::new(vec![Node::Element(
            Element::new("prompt").with_child(Element::new("role").with_attr("id", "ahead")),
        )]);
        let mut ctx =
            ProcessingContext::new(Arc::new(document), "", Arc::new(ErrorHandler::default()));
        ctx.id_map
            .insert("seen".into(), Element::new("persona").with_attr("id", "seen"));

        let seen = IdProtocolHandler
            .handle(&Reference::new("id", "seen"), &ctx)
            .await
            .unwrap();
        let ReferenceValue::Node(node) = seen else {
            panic!("expected node");
        };
        assert_eq!(node.as_element().unwrap().tag_name, "persona");

        let ahead = IdProtocolHandler
            .handle(&Reference::new("id", "ahead"), &ctx)
            .await
            .unwrap();
        assert!(matches!(ahead, ReferenceValue::Node(_)));

        let err = IdProtocolHandler
            .handle(&Reference::new("id", "nope"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::NotFound(_)));
    }
}
