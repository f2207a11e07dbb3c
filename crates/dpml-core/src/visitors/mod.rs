/*
 * visitors/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Standard processing passes.
 */

//! Standard visitors.
//!
//! [`DocumentProcessor::from_options`](crate::processor::DocumentProcessor::from_options)
//! registers all of them. Their priorities fix the order in which they see
//! each node:
//!
//! | Visitor                          | Priority |
//! |----------------------------------|----------|
//! | [`IdValidationVisitor`]          | 100      |
//! | [`MetadataVisitor`]              | 90       |
//! | [`InheritanceVisitor`]           | 80       |
//! | [`AttributeValidationVisitor`]   | 70       |
//! | [`NestingValidationVisitor`]     | 65       |
//! | [`ReferenceResolutionVisitor`]   | 50       |
//! | [`ContentReferenceVisitor`]      | 40       |
//! | [`MarkdownContentVisitor`]       | 30       |

mod attribute_validation;
mod content_references;
mod id_validation;
mod inheritance;
mod markdown;
mod metadata;
mod nesting;
mod reference_resolution;

pub use attribute_validation::AttributeValidationVisitor;
pub use content_references::ContentReferenceVisitor;
pub use id_validation::IdValidationVisitor;
pub use inheritance::{DocumentParser, InheritanceVisitor};
pub use markdown::{MarkdownContentVisitor, MarkdownOptions};
pub use metadata::MetadataVisitor;
pub use nesting::NestingValidationVisitor;
pub use reference_resolution::ReferenceResolutionVisitor;

use crate::context::ProcessingContext;
use crate::error::{ProcessingError, Result, Severity};

pub const ID_VALIDATION_PRIORITY: i32 = 100;
pub const METADATA_PRIORITY: i32 = 90;
pub const INHERITANCE_PRIORITY: i32 = 80;
pub const ATTRIBUTE_VALIDATION_PRIORITY: i32 = 70;
pub const NESTING_VALIDATION_PRIORITY: i32 = 65;
pub const REFERENCE_RESOLUTION_PRIORITY: i32 = 50;
pub const CONTENT_REFERENCE_PRIORITY: i32 = 40;
pub const MARKDOWN_PRIORITY: i32 = 30;

/// Strict findings are errors, loose ones warnings.
fn validation_severity(strict: bool) -> Severity {
    if strict {
        Severity::Error
    } else {
        Severity::Warning
    }
}

/// Report a validation finding with mode-derived severity.
fn report_validation(
    ctx: &mut ProcessingContext,
    error: ProcessingError,
    strict: bool,
) -> Result<()> {
    ctx.report(error, validation_severity(strict))
}
