//! Validation rules and utilities for Strata schemas
//!
//! This module provides validation capabilities for schemas: type names,
//! field definitions, field targets, and abstract type membership. Relation
//! inference reports its own consistency warnings, which can be folded into
//! a `ValidationResult` with [`relation_warnings`].

use crate::Schema;
use crate::relation::RelationTable;
use std::collections::HashSet;
use strata_core::{EngineError, EngineResult};

// ============================================================================
// ValidationResult
// ============================================================================

/// Result of a validation operation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub valid: bool,

    /// List of errors (empty if valid)
    pub errors: Vec<ValidationError>,

    /// List of warnings (non-fatal issues)
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Create a successful validation result
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Create a failed validation result with an error
    pub fn error(error: ValidationError) -> Self {
        Self {
            valid: false,
            errors: vec![error],
            warnings: Vec::new(),
        }
    }

    /// Add an error to the result
    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    /// Add a warning to the result
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Convert to EngineResult (fails if any errors)
    pub fn to_result(self) -> EngineResult<()> {
        if self.valid {
            Ok(())
        } else {
            let msg = self
                .errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            Err(EngineError::schema(msg))
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::ok()
    }
}

// ============================================================================
// ValidationError
// ============================================================================

/// A validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Error code for programmatic handling
    pub code: ValidationErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Path to the problematic element (e.g., "types.User.fields.email")
    pub path: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Add a path to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "[{}] {}", path, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Error codes for validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorCode {
    EmptyTypeName,
    EmptyFieldName,
    DuplicateFieldName,
    UnknownFieldType,
    UniqueListField,
    UnknownPossibleType,
    UnknownInterface,
}

// ============================================================================
// ValidationWarning
// ============================================================================

/// A validation warning (non-fatal issue)
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Warning code
    pub code: ValidationWarningCode,

    /// Human-readable warning message
    pub message: String,

    /// Path to the element
    pub path: Option<String>,
}

impl ValidationWarning {
    /// Create a new warning
    pub fn new(code: ValidationWarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Add a path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "[{}] Warning: {}", path, self.message)
        } else {
            write!(f, "Warning: {}", self.message)
        }
    }
}

/// Warning codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationWarningCode {
    /// Two fields claim one relation name with incompatible endpoints
    RelationMismatch,
    /// An abstract type has no concrete members
    EmptyAbstractType,
}

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait for validation rules
pub trait ValidationRule: Send + Sync {
    /// Get the rule name
    fn name(&self) -> &'static str;

    /// Get the rule description
    fn description(&self) -> &'static str;

    /// Validate a schema and return the result
    fn validate(&self, schema: &Schema) -> ValidationResult;
}

// ============================================================================
// Validator
// ============================================================================

/// Schema validator that runs multiple validation rules
#[derive(Default)]
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create a validator with default rules
    pub fn with_default_rules() -> Self {
        let mut validator = Self::new();
        validator.add_rule(Box::new(TypeNamesRule));
        validator.add_rule(Box::new(TypeFieldsRule));
        validator.add_rule(Box::new(FieldTargetsRule));
        validator.add_rule(Box::new(AbstractTypesRule));
        validator
    }

    /// Add a validation rule
    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    /// Names of the registered rules
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate a schema with all rules
    pub fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();

        for rule in &self.rules {
            result.merge(rule.validate(schema));
        }

        result
    }

    /// Validate and return Result
    pub fn validate_result(&self, schema: &Schema) -> EngineResult<()> {
        self.validate(schema).to_result()
    }
}

// ============================================================================
// Built-in Validation Rules
// ============================================================================

/// Rule: Validate type names
pub struct TypeNamesRule;

impl ValidationRule for TypeNamesRule {
    fn name(&self) -> &'static str {
        "type_names"
    }

    fn description(&self) -> &'static str {
        "Validates that type names are not empty"
    }

    fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();

        for ty in schema.types() {
            if ty.name.is_empty() {
                result.add_error(
                    ValidationError::new(
                        ValidationErrorCode::EmptyTypeName,
                        "Type name cannot be empty",
                    )
                    .with_path("types"),
                );
            }
        }

        result
    }
}

/// Rule: Validate field definitions
pub struct TypeFieldsRule;

impl ValidationRule for TypeFieldsRule {
    fn name(&self) -> &'static str {
        "type_fields"
    }

    fn description(&self) -> &'static str {
        "Validates field names and uniqueness flags"
    }

    fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();

        for ty in schema.types() {
            let mut seen_fields: HashSet<&str> = HashSet::new();

            for field in &ty.fields {
                let field_path = format!("types.{}.fields.{}", ty.name, field.name);

                if field.name.is_empty() {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorCode::EmptyFieldName,
                            format!("Field name cannot be empty on type '{}'", ty.name),
                        )
                        .with_path(format!("types.{}", ty.name)),
                    );
                    continue;
                }

                if !seen_fields.insert(field.name.as_str()) {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorCode::DuplicateFieldName,
                            format!("Duplicate field '{}' on type '{}'", field.name, ty.name),
                        )
                        .with_path(&field_path),
                    );
                }

                if field.unique && field.is_list() {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorCode::UniqueListField,
                            format!(
                                "Field '{}' on type '{}' is a list and cannot be unique",
                                field.name, ty.name
                            ),
                        )
                        .with_path(&field_path),
                    );
                }
            }
        }

        result
    }
}

/// Rule: Validate that every field targets a known type
pub struct FieldTargetsRule;

impl ValidationRule for FieldTargetsRule {
    fn name(&self) -> &'static str {
        "field_targets"
    }

    fn description(&self) -> &'static str {
        "Validates that field types are built-in scalars or declared types"
    }

    fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();

        for ty in schema.types() {
            for field in &ty.fields {
                if schema.is_scalar(&field.type_name) || schema.get_type(&field.type_name).is_some()
                {
                    continue;
                }
                result.add_error(
                    ValidationError::new(
                        ValidationErrorCode::UnknownFieldType,
                        format!(
                            "Field '{}' on type '{}' references unknown type '{}'",
                            field.name, ty.name, field.type_name
                        ),
                    )
                    .with_path(format!("types.{}.fields.{}", ty.name, field.name)),
                );
            }
        }

        result
    }
}

/// Rule: Validate interface and union membership
pub struct AbstractTypesRule;

impl ValidationRule for AbstractTypesRule {
    fn name(&self) -> &'static str {
        "abstract_types"
    }

    fn description(&self) -> &'static str {
        "Validates that possible types and interfaces are declared"
    }

    fn validate(&self, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::ok();

        for ty in schema.types() {
            let path = format!("types.{}", ty.name);

            for member in &ty.possible_types {
                if schema.get_type(member).is_none() {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorCode::UnknownPossibleType,
                            format!("Type '{}' lists unknown possible type '{}'", ty.name, member),
                        )
                        .with_path(&path),
                    );
                }
            }

            for interface in &ty.interfaces {
                if !schema.is_abstract(interface) {
                    result.add_error(
                        ValidationError::new(
                            ValidationErrorCode::UnknownInterface,
                            format!(
                                "Type '{}' implements unknown interface '{}'",
                                ty.name, interface
                            ),
                        )
                        .with_path(&path),
                    );
                }
            }

            if ty.is_abstract() && schema.possible_types(&ty.name).is_empty() {
                result.add_warning(
                    ValidationWarning::new(
                        ValidationWarningCode::EmptyAbstractType,
                        format!("Type '{}' has no concrete members", ty.name),
                    )
                    .with_path(&path),
                );
            }
        }

        result
    }
}

/// Convert relation inference warnings into validation warnings
pub fn relation_warnings(table: &RelationTable) -> ValidationResult {
    let mut result = ValidationResult::ok();
    for warning in table.warnings() {
        result.add_warning(
            ValidationWarning::new(ValidationWarningCode::RelationMismatch, &warning.message)
                .with_path(format!("relations.{}", warning.relation)),
        );
    }
    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDescriptor, TypeDescriptor, compute_relations};

    fn blog() -> Schema {
        Schema::new()
            .with_type(
                TypeDescriptor::object("User")
                    .with_field(FieldDescriptor::new("email", "String").unique())
                    .with_field(FieldDescriptor::list("posts", "Post")),
            )
            .with_type(
                TypeDescriptor::object("Post")
                    .with_field(FieldDescriptor::new("title", "String"))
                    .with_field(FieldDescriptor::new("author", "User")),
            )
    }

    #[test]
    fn test_validation_result_merge() {
        let mut result = ValidationResult::ok();
        result.merge(ValidationResult::error(ValidationError::new(
            ValidationErrorCode::EmptyTypeName,
            "Error",
        )));
        assert!(!result.valid);
        assert!(result.has_errors());
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::new(ValidationErrorCode::EmptyFieldName, "Name is empty")
            .with_path("types.User");
        assert_eq!(error.to_string(), "[types.User] Name is empty");
    }

    #[test]
    fn test_validator_with_valid_schema() {
        let result = Validator::with_default_rules().validate(&blog());
        assert!(result.valid);
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_unique_list_field_is_reported() {
        let schema = blog().with_type(
            TypeDescriptor::object("Tag").with_field(FieldDescriptor::list("labels", "String").unique()),
        );
        let result = Validator::with_default_rules().validate(&schema);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.code == ValidationErrorCode::UniqueListField)
        );
        assert!(result.to_result().unwrap_err().is_schema());
    }

    #[test]
    fn test_unknown_field_type_is_reported() {
        let schema = blog().with_type(
            TypeDescriptor::object("Comment").with_field(FieldDescriptor::new("on", "Missing")),
        );
        let result = FieldTargetsRule.validate(&schema);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ValidationErrorCode::UnknownFieldType);
    }

    #[test]
    fn test_duplicate_field_is_reported() {
        let schema = Schema::new().with_type(
            TypeDescriptor::object("User")
                .with_field(FieldDescriptor::new("name", "String"))
                .with_field(FieldDescriptor::new("name", "String")),
        );
        let result = TypeFieldsRule.validate(&schema);
        assert_eq!(result.errors[0].code, ValidationErrorCode::DuplicateFieldName);
    }

    #[test]
    fn test_abstract_type_rules() {
        let schema = Schema::new()
            .with_type(TypeDescriptor::union("Media").with_possible_type("Video"))
            .with_type(TypeDescriptor::interface("Node"))
            .with_type(TypeDescriptor::object("Photo").implements("Thing"));
        let result = AbstractTypesRule.validate(&schema);

        let codes: Vec<_> = result.errors.iter().map(|e| e.code).collect();
        assert!(codes.contains(&ValidationErrorCode::UnknownPossibleType));
        assert!(codes.contains(&ValidationErrorCode::UnknownInterface));
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.code == ValidationWarningCode::EmptyAbstractType)
        );
    }

    #[test]
    fn test_relation_warnings_are_collected() {
        let schema = Schema::new()
            .with_type(
                TypeDescriptor::object("A")
                    .with_field(FieldDescriptor::new("b", "B").with_relation("Link")),
            )
            .with_type(
                TypeDescriptor::object("B")
                    .with_field(FieldDescriptor::new("a", "A").with_relation("Link")),
            )
            .with_type(
                TypeDescriptor::object("C")
                    .with_field(FieldDescriptor::new("a", "A").with_relation("Link")),
            );
        let result = relation_warnings(&compute_relations(&schema));
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].path.as_deref(), Some("relations.Link"));
    }

    #[test]
    fn test_rule_names() {
        assert_eq!(
            Validator::with_default_rules().rule_names(),
            vec!["type_names", "type_fields", "field_targets", "abstract_types"]
        );
    }
}
