//! Serialization and deserialization for schema files
//!
//! This module provides functionality for saving and loading schema files,
//! including JSON serialization, file I/O, and schema version migration.

use crate::{SCHEMA_VERSION, Schema, TypeDescriptor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_core::{EngineError, EngineResult, Validatable};
use tracing::info;

// ============================================================================
// Schema File Wrapper
// ============================================================================

/// Wrapper for schema files that includes version information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaFile {
    /// Schema version for migration purposes
    #[serde(default = "default_version")]
    pub schema_version: u32,

    /// Type descriptors
    pub types: Vec<TypeDescriptor>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl SchemaFile {
    /// Create a new schema file from a schema
    pub fn new(schema: &Schema) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            types: schema.types().cloned().collect(),
        }
    }

    /// Check if migration is needed
    pub fn needs_migration(&self) -> bool {
        self.schema_version < SCHEMA_VERSION
    }

    /// Migrate to the latest schema version
    pub fn migrate(&mut self) -> EngineResult<()> {
        if self.schema_version > SCHEMA_VERSION {
            return Err(EngineError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        while self.schema_version < SCHEMA_VERSION {
            self.migrate_one_version()?;
        }
        Ok(())
    }

    /// Migrate one version at a time
    fn migrate_one_version(&mut self) -> EngineResult<()> {
        match self.schema_version {
            // Version 0 files predate explicit versioning and share the v1 layout
            0 => self.schema_version = 1,
            _ => self.schema_version = SCHEMA_VERSION,
        }
        Ok(())
    }

    /// Convert into a schema
    pub fn into_schema(self) -> Schema {
        Schema::from_types(self.types)
    }
}

// ============================================================================
// Save Functions
// ============================================================================

/// Save a schema to a file
///
/// # Example
///
/// ```rust,ignore
/// use strata_schema::{Schema, TypeDescriptor, save_schema};
///
/// let schema = Schema::new().with_type(TypeDescriptor::object("User"));
/// save_schema(&schema, "schema.json")?;
/// ```
pub fn save_schema(schema: &Schema, path: impl AsRef<Path>) -> EngineResult<()> {
    let path = path.as_ref();
    let json = schema_to_string(schema)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::FileWrite {
                path: parent.to_path_buf(),
                message: e.to_string(),
            })?;
        }
    }

    std::fs::write(path, json).map_err(|e| EngineError::FileWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Save a schema to a pretty JSON string
pub fn schema_to_string(schema: &Schema) -> EngineResult<String> {
    Ok(serde_json::to_string_pretty(&SchemaFile::new(schema))?)
}

// ============================================================================
// Load Functions
// ============================================================================

/// Load and validate a schema from a file
pub fn load_schema(path: impl AsRef<Path>) -> EngineResult<Schema> {
    let path = path.as_ref();

    let json = std::fs::read_to_string(path).map_err(|e| EngineError::FileRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let schema = parse_schema(&json).map_err(|e| match e {
        EngineError::JsonSerialization(je) => EngineError::FileRead {
            path: path.to_path_buf(),
            message: format!("Invalid schema file format: {}", je),
        },
        other => other,
    })?;

    info!(path = %path.display(), types = schema.len(), "Loaded schema");
    Ok(schema)
}

/// Parse and validate a schema from a JSON string
///
/// Accepts either a versioned schema file or a bare array of types.
pub fn parse_schema(json: &str) -> EngineResult<Schema> {
    let schema = read_schema(json)?;
    schema.validate()?;
    Ok(schema)
}

/// Parse a schema from a JSON string, migrating old versions, without
/// validating it
pub fn read_schema(json: &str) -> EngineResult<Schema> {
    let value: serde_json::Value = serde_json::from_str(json)?;

    let mut file = if value.is_array() {
        SchemaFile {
            schema_version: SCHEMA_VERSION,
            types: serde_json::from_value(value)?,
        }
    } else {
        serde_json::from_value::<SchemaFile>(value)?
    };

    if file.needs_migration() || file.schema_version > SCHEMA_VERSION {
        file.migrate()?;
    }

    Ok(file.into_schema())
}

// ============================================================================
// Tests
// ============================================================================
