//! Source positions for DPML
//!
//! The parser attaches a [`Span`] to every node it produces. Later passes
//! never recompute spans; they only carry them into diagnostics, usually
//! paired with the document path as a [`SourceLocation`].
//!
//! # Example
//!
//! ```rust
//! use dpml_source_map::*;
//!
//! let span = Span::new(Location::new(0, 1, 1), Location::new(7, 1, 8));
//! let location = SourceLocation::new(Some("prompt.dpml".into()), span);
//!
//! assert_eq!(location.to_string(), "prompt.dpml:1:1");
//! ```

pub mod types;

pub use types::{Location, SourceLocation, Span};
