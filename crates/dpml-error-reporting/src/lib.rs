//! Diagnostic messages for DPML processing.
//!
//! Failures discovered while processing a document are reported as
//! [`DiagnosticMessage`]s. A message follows the tidyverse structure used
//! across the workspace:
//!
//! 1. **Code**: stable error code from the [catalog](catalog) (e.g. `D-3-5`)
//! 2. **Title**: brief summary
//! 3. **Problem**: what went wrong
//! 4. **Details**: specific facts, bulleted
//! 5. **Hints**: optional guidance
//!
//! Messages carry an optional [`dpml_source_map::SourceLocation`] and render
//! to plain text ([`DiagnosticMessage::to_text`]) or JSON
//! ([`DiagnosticMessage::to_json`]).
//!
//! ```
//! use dpml_error_reporting::DiagnosticMessageBuilder;
//!
//! let warning = DiagnosticMessageBuilder::warning("Duplicate id")
//!     .with_code("D-3-5")
//!     .problem("Id `intro` is declared more than once")
//!     .add_hint("Rename one of the elements?")
//!     .build();
//!
//! assert!(warning.to_text().contains("Warning [D-3-5]: Duplicate id"));
//! ```

pub mod builder;
pub mod catalog;
pub mod diagnostic;

pub use builder::DiagnosticMessageBuilder;
pub use catalog::{ERROR_CATALOG, ErrorCodeInfo, get_error_info, get_subsystem, get_title};
pub use diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage};
