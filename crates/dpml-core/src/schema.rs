/*
 * schema.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Tag schema registry used by the validation passes.
 */

//! Tag schemas.
//!
//! A [`TagSchemaRegistry`] answers "what does tag X allow?". The built-in
//! [`InMemoryTagRegistry`] can be written by hand or loaded from YAML/JSON:
//!
//! ```yaml
//! role:
//!   required-attributes: [name]
//!   attributes:
//!     name: { type: string }
//!     temperature: { type: number }
//!     tone: { type: enum, values: [calm, playful] }
//!   allowed-children: [example]
//! example:
//!   attributes: [label]
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use hashlink::LinkedHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::Element;
use crate::context::ProcessingContext;

/// Lookup of tag definitions by tag name.
pub trait TagSchemaRegistry: Send + Sync {
    fn tag_definition(&self, tag_name: &str) -> Option<&TagDefinition>;
}

/// Type of an attribute value in a map schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Number,
    Boolean,
    Enum,
}

/// Constraints on a single attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AttributeSpec {
    pub required: bool,
    #[serde(rename = "type")]
    pub value_type: AttributeType,
    /// Permitted values when `type` is `enum`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl AttributeSpec {
    /// Check `value` against the declared type. Returns a description of
    /// the problem when it does not conform.
    pub fn check(&self, value: &str) -> Option<String> {
        match self.value_type {
            AttributeType::String => None,
            AttributeType::Number => value
                .trim()
                .parse::<f64>()
                .is_err()
                .then(|| format!("expected a number, got '{}'", value)),
            AttributeType::Boolean => (!matches!(value, "true" | "false"))
                .then(|| format!("expected true or false, got '{}'", value)),
            AttributeType::Enum => (!self.values.iter().any(|v| v == value)).then(|| {
                format!(
                    "expected one of {}, got '{}'",
                    self.values.join(", "),
                    value
                )
            }),
        }
    }
}

/// Known attributes of a tag: a plain list of names, or a map of names to
/// constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeSchema {
    List(Vec<String>),
    Map(LinkedHashMap<String, AttributeSpec>),
}

impl AttributeSchema {
    pub fn contains(&self, name: &str) -> bool {
        match self {
            AttributeSchema::List(names) => names.iter().any(|n| n == name),
            AttributeSchema::Map(specs) => specs.contains_key(name),
        }
    }

    pub fn spec(&self, name: &str) -> Option<&AttributeSpec> {
        match self {
            AttributeSchema::List(_) => None,
            AttributeSchema::Map(specs) => specs.get(name),
        }
    }

    /// Attributes marked `required: true`. Lists never mark any.
    pub fn required(&self) -> Vec<&str> {
        match self {
            AttributeSchema::List(_) => Vec::new(),
            AttributeSchema::Map(specs) => specs
                .iter()
                .filter(|(_, spec)| spec.required)
                .map(|(name, _)| name.as_str())
                .collect(),
        }
    }
}

/// Outcome of a custom tag validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            ..Default::default()
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.valid = false;
        self.errors.push(message.into());
        self
    }

    pub fn with_warning(mut self, message: impl Into<String>) -> Self {
        self.warnings.push(message.into());
        self
    }
}

/// Tag-specific validation that a schema cannot express.
pub trait TagValidator: Send + Sync {
    fn validate(&self, element: &Element, ctx: &ProcessingContext) -> ValidationResult;
}

/// Schema for one tag.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TagDefinition {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_attributes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeSchema>,
    /// Tags permitted as direct children. `None` allows anything.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_children: Option<Vec<String>>,
    #[serde(skip)]
    pub validator: Option<Arc<dyn TagValidator>>,
}

impl TagDefinition {
    /// Required attributes from both the list and the map schema, without
    /// duplicates, list entries first.
    pub fn all_required(&self) -> Vec<&str> {
        let mut required: Vec<&str> = self
            .required_attributes
            .iter()
            .map(String::as_str)
            .collect();
        if let Some(schema) = &self.attributes {
            for name in schema.required() {
                if !required.contains(&name) {
                    required.push(name);
                }
            }
        }
        required
    }

    pub fn allows_child(&self, tag_name: &str) -> bool {
        self.allowed_children
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|t| t == tag_name))
    }
}

impl fmt::Debug for TagDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDefinition")
            .field("required_attributes", &self.required_attributes)
            .field("attributes", &self.attributes)
            .field("allowed_children", &self.allowed_children)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Failure loading a schema file.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML schema: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid JSON schema: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tag definitions held in memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryTagRegistry {
    tags: HashMap<String, TagDefinition>,
}

impl InMemoryTagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag_name: impl Into<String>, definition: TagDefinition) {
        self.tags.insert(tag_name.into(), definition);
    }

    /// Attach a validator to an already-registered tag. Returns `false`
    /// when the tag is unknown.
    pub fn set_validator(&mut self, tag_name: &str, validator: Arc<dyn TagValidator>) -> bool {
        match self.tags.get_mut(tag_name) {
            Some(definition) => {
                definition.validator = Some(validator);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, SchemaError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json_str(source: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load from a `.json` file, or YAML for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let source = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            Self::from_json_str(&source)
        } else {
            Self::from_yaml_str(&source)
        }
    }
}

impl TagSchemaRegistry for InMemoryTagRegistry {
    fn tag_definition(&self, tag_name: &str) -> Option<&TagDefinition> {
        self.tags.get(tag_name)
    }
}
