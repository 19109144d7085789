//! Schema container
//!
//! This module contains `Schema`, the root container holding every type
//! descriptor. Types are keyed by name in a sorted map so that every walk over
//! the schema is deterministic.

use crate::field::FieldDescriptor;
use crate::naming::concrete_type_name;
use crate::type_descriptor::{TypeDescriptor, TypeKind};
use crate::validation::Validator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_core::{EngineError, EngineResult, ScalarKind, Validatable};

// ============================================================================
// Schema
// ============================================================================

/// Root container for all type descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// All types, keyed by name
    types: BTreeMap<String, TypeDescriptor>,
}

impl Schema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema from a list of type descriptors
    ///
    /// Later descriptors with the same name replace earlier ones.
    pub fn from_types(types: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        Self {
            types: types.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Add a type using builder pattern
    pub fn with_type(mut self, ty: TypeDescriptor) -> Self {
        self.types.insert(ty.name.clone(), ty);
        self
    }

    /// Add a type, failing if the name is taken
    pub fn add_type(&mut self, ty: TypeDescriptor) -> EngineResult<()> {
        if self.types.contains_key(&ty.name) {
            return Err(EngineError::schema(format!(
                "Duplicate type name: '{}' already exists",
                ty.name
            )));
        }
        self.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Get a type by name
    pub fn get_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    /// Get a type by name or fail with `TypeNotFound`
    pub fn type_or_err(&self, name: &str) -> EngineResult<&TypeDescriptor> {
        self.get_type(name)
            .ok_or_else(|| EngineError::TypeNotFound(name.to_string()))
    }

    /// Get a field of a type or fail with `FieldNotFound`
    pub fn field(&self, type_name: &str, field: &str) -> EngineResult<&FieldDescriptor> {
        self.type_or_err(type_name)?
            .field(field)
            .ok_or_else(|| EngineError::FieldNotFound {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })
    }

    /// Iterate over all types in name order
    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// Iterate over object types in name order
    pub fn object_types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values().filter(|t| t.kind == TypeKind::Object)
    }

    /// Get the number of types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Check if the schema has no types
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ========================================================================
    // Type classification
    // ========================================================================

    /// Resolve the scalar kind of a type name
    ///
    /// Built-in scalars resolve directly; declared enums behave as strings and
    /// declared custom scalars pass values through untouched.
    pub fn scalar_kind(&self, type_name: &str) -> Option<ScalarKind> {
        if let Some(kind) = ScalarKind::from_type_name(type_name) {
            return Some(kind);
        }
        match self.get_type(type_name).map(|t| t.kind) {
            Some(TypeKind::Enum) => Some(ScalarKind::Enum),
            Some(TypeKind::Scalar) => Some(ScalarKind::Json),
            _ => None,
        }
    }

    /// Check if a type name resolves to a scalar
    pub fn is_scalar(&self, type_name: &str) -> bool {
        self.scalar_kind(type_name).is_some()
    }

    /// Check if a type name is a declared object, interface, or union
    pub fn is_composite(&self, type_name: &str) -> bool {
        self.get_type(type_name)
            .is_some_and(|t| t.kind.is_composite())
    }

    /// Check if a type name is an interface or union
    pub fn is_abstract(&self, type_name: &str) -> bool {
        self.get_type(type_name).is_some_and(|t| t.is_abstract())
    }

    /// Concrete types a type name may resolve to
    ///
    /// Objects resolve to themselves. Abstract types resolve to their declared
    /// possible types plus any object declaring the interface.
    pub fn possible_types(&self, type_name: &str) -> Vec<String> {
        let Some(ty) = self.get_type(type_name) else {
            return Vec::new();
        };
        if !ty.is_abstract() {
            return vec![ty.name.clone()];
        }

        let mut names: Vec<String> = ty.possible_types.clone();
        for object in self.object_types() {
            if object.interfaces.iter().any(|i| i == type_name) && !names.contains(&object.name)
            {
                names.push(object.name.clone());
            }
        }
        names.sort();
        names
    }

    /// Resolve the concrete type named by a polymorphic argument key
    ///
    /// `"dogs"` and `"dog"` both resolve to `Dog` when that type exists.
    pub fn concrete_type_for_key(&self, key: &str) -> Option<&TypeDescriptor> {
        self.get_type(&concrete_type_name(key))
            .filter(|t| t.kind == TypeKind::Object)
    }
}

impl Validatable for Schema {
    fn validate(&self) -> EngineResult<()> {
        Validator::with_default_rules().validate_result(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
