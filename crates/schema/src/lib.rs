//! # Strata Schema
//!
//! This crate provides the schema model for Strata. It contains the type and
//! field descriptors a data API is derived from, the validation rules run
//! over them, and the relation inference that pairs fields with their
//! inverses.
//!
//! ## Core Concepts
//!
//! - **TypeDescriptor**: A named object, interface, union, scalar, or enum
//! - **FieldDescriptor**: A field with a target type, cardinality, and metadata
//! - **Schema**: The root container holding all type descriptors
//! - **RelationTable**: Relation name → pair of inverse fields
//!

// Module declarations
pub mod field;
pub mod inference;
pub mod naming;
pub mod relation;
pub mod schema;
pub mod serialization;
pub mod type_descriptor;
pub mod validation;

// Re-export commonly used types at crate root
pub use field::FieldDescriptor;
pub use inference::compute_relations;
pub use relation::{Relation, RelationEndpoint, RelationTable, RelationWarning};
pub use schema::Schema;
pub use serialization::{
    SchemaFile, load_schema, parse_schema, read_schema, save_schema, schema_to_string,
};
pub use type_descriptor::{TypeDescriptor, TypeKind};
pub use validation::{
    ValidationError, ValidationResult, ValidationRule, ValidationWarning, Validator,
    relation_warnings,
};

// Re-export core types that are commonly used with schemas
pub use strata_core::{Cardinality, EngineError, EngineResult, ScalarKind};

/// Current version of the schema file format
pub const SCHEMA_VERSION: u32 = 1;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        Cardinality, EngineError, EngineResult, FieldDescriptor, RelationTable, ScalarKind,
        Schema, TypeDescriptor, TypeKind, compute_relations, load_schema,
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        assert_eq!(SCHEMA_VERSION, 1);
    }
}
