//! Declared attribute schema for resource types.
//!
//! Declaration only: the host runtime owns validation, diffing and planning.
//! The schema exists so the host knows which attributes a resource carries
//! and how to treat them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value type of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A boolean value.
    Bool,
}

/// How the host runtime treats a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Must be set in configuration.
    Required,
    /// May be set in configuration.
    Optional,
    /// Set by the provider; read-only for configuration.
    Computed,
}

/// A single declared attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Usage mode.
    pub kind: AttributeKind,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Changing this attribute forces the resource to be replaced.
    #[serde(default)]
    pub force_new: bool,
}

impl Attribute {
    /// An attribute with the given type and kind.
    pub fn new(attr_type: AttributeType, kind: AttributeKind) -> Self {
        Self {
            attr_type,
            kind,
            description: None,
            force_new: false,
        }
    }

    /// A required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeKind::Required)
    }

    /// An optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeKind::Optional)
    }

    /// A computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeKind::Computed)
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the attribute as forcing replacement when changed.
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

/// Declared schema of one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Schema version, for state upgrades.
    #[serde(default)]
    pub version: u64,
    /// Declared attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// A schema at the given version.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            attributes: BTreeMap::new(),
        }
    }

    /// A schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Look up a declared attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::required_string()
            .with_description("owning environment")
            .force_new();

        assert_eq!(attr.attr_type, AttributeType::String);
        assert_eq!(attr.kind, AttributeKind::Required);
        assert_eq!(attr.description.as_deref(), Some("owning environment"));
        assert!(attr.force_new);

        assert_eq!(Attribute::computed_string().kind, AttributeKind::Computed);
        assert!(!Attribute::optional_string().force_new);
    }

    #[test]
    fn test_schema_builder() {
        let schema = Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string());

        assert_eq!(schema.version, 0);
        assert!(schema.attribute("id").is_some());
        assert!(schema.attribute("missing").is_none());
    }

    #[test]
    fn test_schema_serialization() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        let encoded = serde_json::to_value(&schema).unwrap();

        assert_eq!(encoded["attributes"]["name"]["type"], "string");
        assert_eq!(encoded["attributes"]["name"]["kind"], "required");
        assert_eq!(encoded["attributes"]["name"]["force_new"], false);
    }
}
