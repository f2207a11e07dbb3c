/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Processor configuration.
 */

//! Processor configuration.
//!
//! [`ProcessorOptions`] is the serializable configuration for
//! [`DocumentProcessor::from_options`](crate::processor::DocumentProcessor::from_options).
//! Every field has a default, so partial files are fine:
//!
//! ```yaml
//! strict-mode: false
//! error-recovery: true
//! tag-schema: schema/tags.yml
//! attribute-validation:
//!   strict: true
//! http:
//!   timeout-ms: 5000
//! markdown:
//!   line-breaks: true
//! ```
//!
//! Error callbacks cannot be serialized; set them on
//! [`ErrorHandlerOptions`] after loading.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error_handler::ErrorHandlerOptions;
use crate::reference::DEFAULT_TIMEOUT_MS;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProcessorOptions {
    /// Escalate errors to fatal and treat loose-mode findings as errors.
    pub strict_mode: bool,
    /// Record non-fatal errors and keep going instead of failing.
    pub error_recovery: bool,
    pub cache_references: bool,
    /// YAML or JSON tag schema used by the validation visitors.
    pub tag_schema: Option<PathBuf>,
    pub id_validation: IdValidationOptions,
    pub attribute_validation: AttributeValidationOptions,
    pub file: FileOptions,
    pub http: HttpConfig,
    pub markdown: MarkdownConfig,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            error_recovery: false,
            cache_references: true,
            tag_schema: None,
            id_validation: IdValidationOptions::default(),
            attribute_validation: AttributeValidationOptions::default(),
            file: FileOptions::default(),
            http: HttpConfig::default(),
            markdown: MarkdownConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IdValidationOptions {
    /// Duplicate ids abort processing instead of warning.
    pub strict: bool,
}

/// Applies to attribute and nesting validation alike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AttributeValidationOptions {
    pub strict: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileOptions {
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
    pub insecure_tls: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            insecure_tls: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MarkdownConfig {
    pub enabled: bool,
    pub sanitize: bool,
    pub line_breaks: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sanitize: true,
            line_breaks: false,
        }
    }
}

impl ProcessorOptions {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load from a `.json` file, or YAML for any other extension.
    ///
    /// Relative `tag-schema` and `file.base-dir` paths are resolved against
    /// the file's directory.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut options = if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            Self::from_json_str(&source)?
        } else {
            Self::from_yaml_str(&source)?
        };

        if let Some(dir) = path.parent() {
            if let Some(schema) = options.tag_schema.as_mut()
                && schema.is_relative()
            {
                *schema = dir.join(&*schema);
            }
            if let Some(base) = options.file.base_dir.as_mut()
                && base.is_relative()
            {
                *base = dir.join(&*base);
            }
        }
        Ok(options)
    }

    /// Error handler settings. Callbacks are left at their defaults.
    pub fn error_handler_options(&self) -> ErrorHandlerOptions {
        ErrorHandlerOptions {
            strict_mode: self.strict_mode,
            error_recovery: self.error_recovery,
            ..Default::default()
        }
    }
}
