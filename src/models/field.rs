//! Plugin field schema and the values attached to it

use serde::{Deserialize, Serialize};

/// One selectable option of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub key: String,
    pub label: String,
}

/// Static descriptor of a configurable plugin setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Input type hint ("input", "select", "number", ...)
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
    #[serde(default)]
    pub allowed: Option<Vec<String>>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub capitalize: Option<bool>,
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: None,
            description: None,
            field_type: None,
            required: false,
            default: None,
            format: None,
            options: None,
            allowed: None,
            instructions: None,
            capitalize: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A field descriptor together with its effective value for one library.
///
/// `value` is omitted entirely when there is neither a stored value nor a
/// default, so that an unset field stays distinguishable from an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginField {
    #[serde(flatten)]
    pub descriptor: FieldDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}
