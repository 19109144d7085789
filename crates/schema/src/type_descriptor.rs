//! Type descriptors for schema types
//!
//! This module contains the `TypeDescriptor` struct describing one named type
//! of the schema: its kind, its ordered fields, and, for abstract types, the
//! concrete types it may resolve to.

use crate::field::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strata_core::{EngineError, EngineResult, Validatable};

// ============================================================================
// TypeKind
// ============================================================================

/// The kind of a schema type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// Concrete record type
    #[default]
    Object,
    /// Abstract type implemented by objects
    Interface,
    /// Abstract type listing member objects
    Union,
    /// Custom scalar
    Scalar,
    /// Enumeration (stored as strings)
    Enum,
}

impl TypeKind {
    /// Check if the kind is an interface or union
    pub fn is_abstract(&self) -> bool {
        matches!(self, TypeKind::Interface | TypeKind::Union)
    }

    /// Check if values of this kind are records (objects, interfaces, unions)
    pub fn is_composite(&self) -> bool {
        matches!(self, TypeKind::Object | TypeKind::Interface | TypeKind::Union)
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeKind::Object => write!(f, "object"),
            TypeKind::Interface => write!(f, "interface"),
            TypeKind::Union => write!(f, "union"),
            TypeKind::Scalar => write!(f, "scalar"),
            TypeKind::Enum => write!(f, "enum"),
        }
    }
}

// ============================================================================
// TypeDescriptor
// ============================================================================

/// Represents a named type of the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    /// Type name (e.g., "User")
    pub name: String,

    /// Kind of type
    #[serde(default)]
    pub kind: TypeKind,

    /// Ordered fields
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,

    /// Concrete types an interface or union may resolve to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_types: Vec<String>,

    /// Interfaces an object implements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<String>,
}

impl TypeDescriptor {
    /// Create a new object type with the given name
    pub fn object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Object,
            fields: Vec::new(),
            possible_types: Vec::new(),
            interfaces: Vec::new(),
        }
    }

    /// Create a new interface type
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Interface,
            ..Self::object(name)
        }
    }

    /// Create a new union type
    pub fn union(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Union,
            ..Self::object(name)
        }
    }

    /// Create a new custom scalar type
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Scalar,
            ..Self::object(name)
        }
    }

    /// Create a new enum type
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self {
            kind: TypeKind::Enum,
            ..Self::object(name)
        }
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Add a field using builder pattern
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a possible concrete type
    pub fn with_possible_type(mut self, type_name: impl Into<String>) -> Self {
        self.possible_types.push(type_name.into());
        self
    }

    /// Declare an implemented interface
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    // ========================================================================
    // Field access
    // ========================================================================

    /// Get a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check if a field exists
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Count fields pointing at the given type
    pub fn count_fields_targeting(&self, type_name: &str) -> usize {
        self.fields.iter().filter(|f| f.targets(type_name)).count()
    }

    /// Names of fields flagged unique
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// Check if this is an interface or union
    pub fn is_abstract(&self) -> bool {
        self.kind.is_abstract()
    }
}

impl Validatable for TypeDescriptor {
    fn validate(&self) -> EngineResult<()> {
        if self.name.is_empty() {
            return Err(EngineError::schema("Type name cannot be empty"));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            field.validate().map_err(|e| {
                EngineError::schema(format!("{}: {}", self.name, strip_prefix(&e)))
            })?;
            if !seen.insert(field.name.as_str()) {
                return Err(EngineError::schema(format!(
                    "Duplicate field '{}' on type '{}'",
                    field.name, self.name
                )));
            }
        }

        Ok(())
    }
}

fn strip_prefix(err: &EngineError) -> String {
    match err {
        EngineError::SchemaValidation(msg) => msg.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> TypeDescriptor {
        TypeDescriptor::object("User")
            .with_field(FieldDescriptor::new("id", "ID"))
            .with_field(FieldDescriptor::new("email", "String").unique())
            .with_field(FieldDescriptor::list("posts", "Post"))
            .with_field(FieldDescriptor::new("pinned", "Post"))
    }

    #[test]
    fn test_type_kinds() {
        assert!(TypeKind::Interface.is_abstract());
        assert!(TypeKind::Union.is_composite());
        assert!(!TypeKind::Scalar.is_composite());
        assert!(!TypeKind::Object.is_abstract());
    }

    #[test]
    fn test_field_lookup() {
        let ty = user();
        assert!(ty.has_field("email"));
        assert!(!ty.has_field("missing"));
        assert_eq!(ty.field("posts").map(|f| f.is_list()), Some(true));
    }

    #[test]
    fn test_count_fields_targeting() {
        let ty = user();
        assert_eq!(ty.count_fields_targeting("Post"), 2);
        assert_eq!(ty.count_fields_targeting("Comment"), 0);
    }

    #[test]
    fn test_unique_fields() {
        let names: Vec<_> = user().unique_fields().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["email".to_string()]);
    }

    #[test]
    fn test_duplicate_field_is_invalid() {
        let ty = TypeDescriptor::object("User")
            .with_field(FieldDescriptor::new("name", "String"))
            .with_field(FieldDescriptor::new("name", "String"));
        let err = ty.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate field 'name'"));
    }

    #[test]
    fn test_invalid_field_reports_type() {
        let ty = TypeDescriptor::object("User")
            .with_field(FieldDescriptor::list("emails", "String").unique());
        let err = ty.validate().unwrap_err();
        assert!(err.to_string().contains("User: Field 'emails' is a list"));
    }

    #[test]
    fn test_abstract_builders() {
        let ty = TypeDescriptor::interface("Animal")
            .with_possible_type("Dog")
            .with_possible_type("Cat");
        assert!(ty.is_abstract());
        assert_eq!(ty.possible_types.len(), 2);
    }
}
