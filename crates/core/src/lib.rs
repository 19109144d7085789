//! # Strata Core
//!
//! Core types, traits, and error handling for Strata.
//!
//! This crate provides the foundational building blocks used throughout
//! the Strata workspace, including:
//!
//! - **Types**: Dynamic values, scalar kinds, cardinality, and flat records
//! - **Traits**: The `Validatable` trait shared by schema components
//! - **Errors**: Unified error handling with `EngineError` and `EngineResult`
//!

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{EngineError, EngineResult, ResultExt};
pub use traits::Validatable;
pub use types::{
    Cardinality, FieldMap, ID_FIELD, Record, RecordId, ScalarKind, TYPENAME_FIELD, Value,
    describe,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
