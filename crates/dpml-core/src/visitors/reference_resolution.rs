//! Resolution of `Reference` nodes.

use std::sync::Arc;

use async_trait::async_trait;

use super::REFERENCE_RESOLUTION_PRIORITY;
use crate::ast::Reference;
use crate::context::ProcessingContext;
use crate::error::Result;
use crate::reference::ReferenceResolver;
use crate::visitor::{ReferenceVisitor, Visitor};

/// Fills `resolved` on every reference node through the shared resolver.
pub struct ReferenceResolutionVisitor {
    resolver: Arc<ReferenceResolver>,
}

impl ReferenceResolutionVisitor {
    pub fn new(resolver: Arc<ReferenceResolver>) -> Self {
        Self { resolver }
    }
}

impl Visitor for ReferenceResolutionVisitor {
    fn name(&self) -> &str {
        "reference-resolution"
    }

    fn priority(&self) -> i32 {
        REFERENCE_RESOLUTION_PRIORITY
    }

    fn as_reference_visitor(&self) -> Option<&dyn ReferenceVisitor> {
        Some(self)
    }
}

#[async_trait]
impl ReferenceVisitor for ReferenceResolutionVisitor {
    async fn visit_reference(
        &self,
        reference: &Reference,
        ctx: &mut ProcessingContext,
    ) -> Result<Option<Reference>> {
        if reference.resolved.is_some() {
            return Ok(None);
        }
        let value = self.resolver.resolve(reference, ctx).await?;
        Ok(Some(Reference {
            resolved: Some(value),
            ..reference.clone()
        }))
    }
}
