//! Error types for Strata
//!
//! This module provides unified error handling across the engine, covering
//! schema problems, mutation argument failures, pagination errors, store
//! failures, and file/serialization errors.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Strata
#[derive(Debug, Error)]
pub enum EngineError {
    // ========================================================================
    // Schema Errors
    // ========================================================================
    /// Schema failed validation
    #[error("Schema validation error: {0}")]
    SchemaValidation(String),

    /// Two fields claim the same relation with incompatible endpoints
    #[error("Schema consistency error for relation '{relation}': {message}")]
    SchemaConsistency { relation: String, message: String },

    /// Type not present in the schema
    #[error("Type not found: {0}")]
    TypeNotFound(String),

    /// Field not present on a type
    #[error("Field '{field}' not found on type '{type_name}'")]
    FieldNotFound { type_name: String, field: String },

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// A create or update would duplicate a value on a unique field
    #[error("can not create record with duplicate on unique field on type {type_name} {args}")]
    UniquenessConflict { type_name: String, args: String },

    /// A where-clause or unique lookup resolved to nothing
    #[error("{type_name} does not exist with where args {args}")]
    NotFound { type_name: String, args: String },

    /// A connect lookup resolved to nothing
    #[error("tried to connect using unique value that does not exist {args}")]
    ConnectTargetMissing { type_name: String, args: String },

    /// Caller supplied an argument the engine cannot accept
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Store Errors
    // ========================================================================
    /// The record store rejected an operation
    #[error("Store error on '{type_name}': {message}")]
    Store { type_name: String, message: String },

    // ========================================================================
    // IO / Serialization Errors
    // ========================================================================
    /// File IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File read error
    #[error("Failed to read file '{path}': {message}")]
    FileRead { path: PathBuf, message: String },

    /// File write error
    #[error("Failed to write file '{path}': {message}")]
    FileWrite { path: PathBuf, message: String },

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// Schema file version mismatch
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: u32, found: u32 },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

impl EngineError {
    /// Create a schema validation error
    pub fn schema(msg: impl Into<String>) -> Self {
        EngineError::SchemaValidation(msg.into())
    }

    /// Create a not-found error for a type and the offending arguments
    pub fn not_found(type_name: impl Into<String>, args: impl Into<String>) -> Self {
        EngineError::NotFound {
            type_name: type_name.into(),
            args: args.into(),
        }
    }

    /// Create a uniqueness conflict error
    pub fn uniqueness_conflict(type_name: impl Into<String>, args: impl Into<String>) -> Self {
        EngineError::UniquenessConflict {
            type_name: type_name.into(),
            args: args.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        EngineError::InvalidArgument(msg.into())
    }

    /// Create a store error
    pub fn store(type_name: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::Store {
            type_name: type_name.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::Internal(msg.into())
    }

    /// Create an error with context
    pub fn with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::WithContext {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Check if this error comes from the schema
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            EngineError::SchemaValidation(_)
                | EngineError::SchemaConsistency { .. }
                | EngineError::TypeNotFound(_)
                | EngineError::FieldNotFound { .. }
        )
    }

    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound { .. } | EngineError::ConnectTargetMissing { .. }
        )
    }

    /// Check if this error is a uniqueness conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::UniquenessConflict { .. })
    }

    /// Check if this error is an invalid argument
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, EngineError::InvalidArgument(_))
    }

    /// Check if this error is an IO error
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            EngineError::Io(_) | EngineError::FileRead { .. } | EngineError::FileWrite { .. }
        )
    }
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> EngineResult<T>;
}

impl<T, E: Into<EngineError>> ResultExt<T> for Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> EngineResult<T> {
        self.map_err(|e| {
            let err: EngineError = e.into();
            EngineError::WithContext {
                context: context.into(),
                message: err.to_string(),
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error() {
        let err = EngineError::schema("unique list field");
        assert!(err.is_schema());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Schema validation error: unique list field"
        );
    }

    #[test]
    fn test_not_found_error() {
        let err = EngineError::not_found("User", r#"{"email":"a@b.c"}"#);
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(
            err.to_string(),
            r#"User does not exist with where args {"email":"a@b.c"}"#
        );
    }

    #[test]
    fn test_connect_missing_is_not_found() {
        let err = EngineError::ConnectTargetMissing {
            type_name: "Post".to_string(),
            args: r#"{"id":"p1"}"#.to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            r#"tried to connect using unique value that does not exist {"id":"p1"}"#
        );
    }

    #[test]
    fn test_uniqueness_conflict() {
        let err = EngineError::uniqueness_conflict("User", "[]");
        assert!(err.is_conflict());
        assert!(
            err.to_string()
                .starts_with("can not create record with duplicate on unique field on type User")
        );
    }

    #[test]
    fn test_invalid_argument() {
        let err = EngineError::invalid_argument("first must be greater than 0");
        assert!(err.is_invalid_argument());
        assert_eq!(
            err.to_string(),
            "Invalid argument: first must be greater than 0"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = EngineError::with_context("Loading schema", "Permission denied");
        assert_eq!(err.to_string(), "Loading schema: Permission denied");
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result.with_context("Reading script").unwrap_err();
        assert_eq!(err.to_string(), "Reading script: IO error: missing");
    }

    #[test]
    fn test_io_error_classification() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EngineError = io_err.into();
        assert!(err.is_io());
    }
}
