//! Field definitions for type descriptors
//!
//! This module contains the `FieldDescriptor` struct describing one field of
//! a schema type: its target type, cardinality, and declared metadata.

use serde::{Deserialize, Serialize};
use strata_core::{Cardinality, EngineError, EngineResult, Validatable};

// ============================================================================
// FieldDescriptor
// ============================================================================

/// Represents a field on a schema type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,

    /// Name of the type this field points at (scalar or composite)
    #[serde(rename = "type")]
    pub type_name: String,

    /// Single value or ordered list
    #[serde(default)]
    pub cardinality: Cardinality,

    /// Whether the field is required (non-null)
    #[serde(default)]
    pub required: bool,

    /// Explicit relation name pairing this field with its inverse
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,

    /// Whether the field value must be unique across records of the type
    #[serde(default)]
    pub unique: bool,
}

impl FieldDescriptor {
    /// Create a new singular field
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            cardinality: Cardinality::Single,
            required: false,
            relation: None,
            unique: false,
        }
    }

    /// Create a new list field
    pub fn list(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, type_name).with_cardinality(Cardinality::List)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Set the cardinality
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field as unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set an explicit relation name
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    // ========================================================================
    // Query methods
    // ========================================================================

    /// Check if the field holds a list
    pub fn is_list(&self) -> bool {
        self.cardinality.is_list()
    }

    /// Check if the field points at the given type
    pub fn targets(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }
}

impl Validatable for FieldDescriptor {
    fn validate(&self) -> EngineResult<()> {
        if self.name.is_empty() {
            return Err(EngineError::schema("Field name cannot be empty"));
        }

        if self.type_name.is_empty() {
            return Err(EngineError::schema(format!(
                "Field '{}' has no target type",
                self.name
            )));
        }

        if self.unique && self.is_list() {
            return Err(EngineError::schema(format!(
                "Field '{}' is a list and cannot be unique",
                self.name
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_builders() {
        let field = FieldDescriptor::new("email", "String").unique().required();
        assert!(field.unique);
        assert!(field.required);
        assert!(!field.is_list());

        let field = FieldDescriptor::list("posts", "Post").with_relation("UserPosts");
        assert!(field.is_list());
        assert_eq!(field.relation.as_deref(), Some("UserPosts"));
        assert!(field.targets("Post"));
    }

    #[test]
    fn test_unique_list_field_is_invalid() {
        let field = FieldDescriptor::list("tags", "String").unique();
        let err = field.validate().unwrap_err();
        assert!(err.is_schema());
        assert!(err.to_string().contains("cannot be unique"));
    }

    #[test]
    fn test_empty_names_are_invalid() {
        assert!(!FieldDescriptor::new("", "String").is_valid());
        assert!(!FieldDescriptor::new("name", "").is_valid());
        assert!(FieldDescriptor::new("name", "String").is_valid());
    }

    #[test]
    fn test_field_json_shape() {
        let field: FieldDescriptor = serde_json::from_str(
            r#"{"name": "author", "type": "User", "relation": "Authored"}"#,
        )
        .unwrap();
        assert_eq!(field.cardinality, Cardinality::Single);
        assert_eq!(field.relation.as_deref(), Some("Authored"));
        assert!(!field.unique);
    }
}
