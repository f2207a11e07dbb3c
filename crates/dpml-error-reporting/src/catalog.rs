//! Error code catalog and lookup.
//!
//! Maps error codes (like "D-1-2") to their metadata. Codes are grouped by
//! subsystem: `0` internal, `1` reference resolution, `2` inheritance,
//! `3` validation.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for an error code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    /// Subsystem name (e.g., "reference", "inheritance", "validation")
    pub subsystem: String,

    /// Short title for the error
    pub title: String,

    /// Default message used when a diagnostic has no problem statement
    pub message_template: String,

    /// When this error was introduced (version)
    pub since_version: String,
}

/// Global error catalog, embedded at compile time.
///
/// # Panics
///
/// Panics if the embedded JSON is invalid, which can only happen when the
/// catalog file is edited by hand incorrectly.
pub static ERROR_CATALOG: Lazy<HashMap<String, ErrorCodeInfo>> = Lazy::new(|| {
    let json_data = include_str!("../error_catalog.json");
    serde_json::from_str(json_data).expect("Invalid error catalog JSON - this is a bug in DPML")
});

/// Look up error code information.
///
/// ```
/// use dpml_error_reporting::catalog::get_error_info;
///
/// let info = get_error_info("D-2-1").unwrap();
/// assert_eq!(info.title, "Circular Reference");
/// ```
pub fn get_error_info(code: &str) -> Option<&ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

/// Get the catalog title for an error code.
pub fn get_title(code: &str) -> Option<&str> {
    ERROR_CATALOG.get(code).map(|info| info.title.as_str())
}

/// Get the subsystem name for an error code.
///
/// ```
/// use dpml_error_reporting::catalog::get_subsystem;
///
/// assert_eq!(get_subsystem("D-0-1"), Some("internal"));
/// ```
pub fn get_subsystem(code: &str) -> Option<&str> {
    ERROR_CATALOG.get(code).map(|info| info.subsystem.as_str())
}
