//! # Strata Engine
//!
//! Resolution engine for Strata.
//!
//! This crate turns a validated schema into a working data API on top of a
//! generic record store.
//!
//! ## Features
//!
//! - **Record Store**: The storage contract and an in-memory implementation
//!   that keeps inverse links in sync
//! - **Nested Mutations**: Create, update, upsert, delete, connect and
//!   disconnect across relation fields in one call
//! - **Filters**: Structured filters and orderBy specs, including filters on
//!   related records
//! - **Connections**: Relay-style cursor pagination with page metadata
//!

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod args;
pub mod cache;
pub mod connection;
pub mod filter;
pub mod mutation;
pub mod query;
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{DataApi, Operation, OperationKind};
pub use args::{
    ArgParser, DeleteSpec, DisconnectSpec, InputValue, MutationArgs, MutationInput, MutationKind,
    NestedArgs, NestedInput, RecordInput, Selector, UpdateInput, UpsertInput,
};
pub use cache::ResolutionCache;
pub use connection::{Aggregate, Connection, Edge, PageArgs, PageInfo, paginate};
pub use filter::{Filter, FilterTranslator, OrderBy};
pub use mutation::{MutationEngine, MutationPayload};
pub use query::{QueryArgs, QueryEngine, QueryResult};
pub use store::{MemoryStore, Predicate, QueryOptions, RecordStore, RecordUpdate, SortKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        Connection, DataApi, Filter, MemoryStore, MutationKind, MutationPayload, Operation,
        OperationKind, OrderBy, PageArgs, QueryArgs, RecordStore,
    };
    pub use strata_core::{EngineError, EngineResult, Record, Value};
}
