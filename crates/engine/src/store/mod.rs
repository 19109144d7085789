//! Record store contract
//!
//! The resolution engines talk to storage only through [`RecordStore`]: a
//! generic typed store keyed by type name that understands flat records and
//! id links. [`MemoryStore`] is the in-process implementation.

pub mod memory;
pub mod options;
pub mod schema;

pub use memory::MemoryStore;
pub use options::{Predicate, QueryOptions, SortKey};
pub use schema::{StorageBucket, StoreField, StoreSchema};

use async_trait::async_trait;
use strata_core::{EngineResult, FieldMap, ID_FIELD, Record, RecordId, Value};

// ============================================================================
// RecordUpdate
// ============================================================================

/// A change to one stored record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    /// Record to change
    pub id: RecordId,

    /// Fields to overwrite
    pub replace: FieldMap,

    /// List fields to append to (existing elements are skipped)
    pub push: FieldMap,

    /// List fields to remove elements from
    pub pull: FieldMap,
}

impl RecordUpdate {
    /// Create an empty update for a record
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Split a patch into replace and push parts: lists are pushed, everything
    /// else replaced
    pub fn from_patch(id: impl Into<RecordId>, patch: FieldMap) -> Self {
        let mut update = Self::new(id);
        for (field, value) in patch {
            if field == ID_FIELD {
                continue;
            }
            match value {
                Value::List(_) => update.push.insert(field, value),
                other => update.replace.insert(field, other),
            };
        }
        update
    }

    /// Overwrite a field
    pub fn with_replace(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.replace.insert(field.into(), value.into());
        self
    }

    /// Append to a list field
    pub fn with_push(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push.insert(field.into(), value.into());
        self
    }

    /// Remove from a list field
    pub fn with_pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pull.insert(field.into(), value.into());
        self
    }

    /// Check if the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.push.is_empty() && self.pull.is_empty()
    }
}

// ============================================================================
// RecordStore Trait
// ============================================================================

/// Generic typed record store
///
/// Types are addressed by schema type name. Abstract types resolve to any of
/// their concrete types.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find records of a type, optionally restricted to ids, then apply options
    async fn find(
        &self,
        type_name: &str,
        ids: Option<&[RecordId]>,
        options: &QueryOptions,
    ) -> EngineResult<Vec<Record>>;

    /// Create records of a concrete type
    async fn create(&self, type_name: &str, records: Vec<FieldMap>) -> EngineResult<Vec<Record>>;

    /// Apply updates to records of a type
    async fn update(&self, type_name: &str, updates: Vec<RecordUpdate>)
    -> EngineResult<Vec<Record>>;

    /// Delete records by id; returns whether every id existed
    async fn delete(&self, type_name: &str, ids: &[RecordId]) -> EngineResult<bool>;

    /// Target type linked by a relation field
    fn get_link(&self, type_name: &str, field: &str) -> Option<String>;

    /// Unique fields of a type
    fn unique_fields(&self, type_name: &str) -> Vec<String>;

    /// Filter, sort, and window records already in hand
    fn apply_options(
        &self,
        _type_name: &str,
        records: Vec<Record>,
        options: &QueryOptions,
    ) -> Vec<Record> {
        options.apply(records)
    }

    /// Look up one record by unique field values
    ///
    /// An `id` entry takes precedence over every other entry.
    async fn get_value_by_unique(
        &self,
        type_name: &str,
        unique: &FieldMap,
    ) -> EngineResult<Option<Record>> {
        if let Some(id) = unique.get(ID_FIELD).and_then(Value::as_str) {
            let ids = [id.to_string()];
            let found = self
                .find(type_name, Some(&ids), &QueryOptions::default())
                .await?;
            return Ok(found.into_iter().next());
        }
        if unique.is_empty() {
            return Ok(None);
        }

        let options = QueryOptions::new().with_predicate(Predicate::Match(unique.clone()));
        Ok(self
            .find(type_name, None, &options)
            .await?
            .into_iter()
            .next())
    }

    /// Check that no candidate duplicates a stored value on a unique field
    async fn can_add(&self, type_name: &str, candidates: &[FieldMap]) -> EngineResult<bool> {
        for field in self.unique_fields(type_name) {
            for candidate in candidates {
                let Some(value) = candidate.get(&field).filter(|v| v.is_truthy()) else {
                    continue;
                };
                let mut unique = FieldMap::new();
                unique.insert(field.clone(), value.clone());
                if self.get_value_by_unique(type_name, &unique).await?.is_some() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

// ============================================================================
// Tests
// ============================================================================
