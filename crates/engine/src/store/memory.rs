//! In-memory record store
//!
//! Keeps one insertion-ordered table per storage bucket behind a
//! `tokio::sync::RwLock`. Every write keeps inverse links in sync: linking a
//! record on one side links it on the other, and unlinking or deleting
//! removes it from both.

use super::options::{Predicate, QueryOptions};
use super::schema::{StorageBucket, StoreField, StoreSchema};
use super::{RecordStore, RecordUpdate};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use strata_core::{
    EngineError, EngineResult, FieldMap, ID_FIELD, Record, RecordId, TYPENAME_FIELD, Value,
    describe,
};
use strata_schema::{Schema, compute_relations};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

// ============================================================================
// Tables
// ============================================================================

/// Storage bucket name → records in insertion order
#[derive(Debug, Default)]
struct Tables {
    buckets: HashMap<String, Vec<Record>>,
}

impl Tables {
    fn table(&self, storage: &str) -> &[Record] {
        self.buckets.get(storage).map(Vec::as_slice).unwrap_or(&[])
    }

    fn get(&self, storage: &str, id: &str) -> Option<&Record> {
        self.table(storage).iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, storage: &str, id: &str) -> Option<&mut Record> {
        self.buckets
            .get_mut(storage)?
            .iter_mut()
            .find(|r| r.id == id)
    }

    fn insert(&mut self, storage: &str, record: Record) {
        self.buckets
            .entry(storage.to_string())
            .or_default()
            .push(record);
    }

    fn remove(&mut self, storage: &str, id: &str, allowed: &[String]) -> Option<Record> {
        let table = self.buckets.get_mut(storage)?;
        let index = table
            .iter()
            .position(|r| r.id == id && allowed.contains(&r.type_name))?;
        Some(table.remove(index))
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Record store holding everything in process memory
#[derive(Debug)]
pub struct MemoryStore {
    schema: StoreSchema,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store over a storage layout
    pub fn new(schema: StoreSchema) -> Self {
        Self {
            schema,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Create an empty store for a schema
    pub fn from_schema(schema: &Schema) -> EngineResult<Self> {
        let relations = compute_relations(schema);
        Ok(Self::new(StoreSchema::build(schema, &relations)?))
    }

    /// Storage layout used by this store
    pub fn store_schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Number of stored records of a type
    pub async fn count(&self, type_name: &str) -> usize {
        let concrete = self.schema.concrete_types(type_name);
        let tables = self.tables.read().await;
        tables
            .table(self.schema.storage_name(type_name))
            .iter()
            .filter(|r| concrete.contains(&r.type_name))
            .count()
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn bucket(&self, type_name: &str) -> EngineResult<&StorageBucket> {
        self.schema
            .bucket(type_name)
            .ok_or_else(|| EngineError::TypeNotFound(type_name.to_string()))
    }

    fn field<'a>(
        &self,
        bucket: &'a StorageBucket,
        type_name: &str,
        name: &str,
    ) -> EngineResult<&'a StoreField> {
        bucket.fields.get(name).ok_or_else(|| {
            EngineError::invalid_argument(format!(
                "Unknown field '{}' on type '{}'",
                name, type_name
            ))
        })
    }

    /// Coerce an input value into the stored shape of a field
    fn normalize(&self, type_name: &str, field: &StoreField, value: Value) -> EngineResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        if field.is_link() {
            let ids = match &value {
                Value::String(_) | Value::List(_) => value.ids(),
                _ => Vec::new(),
            };
            let valid = match &value {
                Value::String(_) => true,
                Value::List(items) => items.len() == ids.len(),
                _ => false,
            };
            if !valid {
                return Err(EngineError::invalid_argument(format!(
                    "Field '{}' on type '{}' expects record ids, got {}",
                    field.name, type_name, value
                )));
            }
            if field.is_list() {
                return Ok(Value::id_list(dedup(ids)));
            }
            return match ids.as_slice() {
                [id] => Ok(Value::String(id.clone())),
                _ => Err(EngineError::invalid_argument(format!(
                    "Field '{}' on type '{}' links a single record",
                    field.name, type_name
                ))),
            };
        }

        let value = match field.scalar {
            Some(kind) => kind.parse_value(value),
            None => value,
        };
        match value {
            Value::List(_) => Ok(value),
            other if field.is_list() => Ok(Value::List(vec![other])),
            other => Ok(other),
        }
    }

    /// Fail if any linked id does not exist
    fn check_links(
        &self,
        tables: &Tables,
        type_name: &str,
        field: &StoreField,
        value: &Value,
    ) -> EngineResult<()> {
        let Some(link) = &field.link else {
            return Ok(());
        };
        let storage = self.schema.storage_name(link);
        let allowed = self.schema.concrete_types(link);
        for id in value.ids() {
            let exists = tables
                .get(storage, &id)
                .is_some_and(|r| allowed.contains(&r.type_name));
            if !exists {
                return Err(EngineError::store(
                    type_name,
                    format!(
                        "linked record '{}' does not exist for field '{}'",
                        id, field.name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Put `source_id` into `field_name` of a linked record
    fn attach(
        &self,
        tables: &mut Tables,
        target_type: &str,
        target_id: &str,
        field_name: &str,
        source_id: &str,
    ) {
        let Some(field) = self.schema.field(target_type, field_name) else {
            return;
        };
        let Some(record) = tables.get_mut(self.schema.storage_name(target_type), target_id) else {
            return;
        };

        if field.is_list() {
            let mut ids = record.link_ids(field_name);
            if !ids.iter().any(|id| id == source_id) {
                ids.push(source_id.to_string());
                record
                    .fields
                    .insert(field_name.to_string(), Value::id_list(ids));
            }
            return;
        }

        let previous = record
            .fields
            .insert(field_name.to_string(), Value::String(source_id.to_string()));

        // A singular field drops its previous partner, which must forget us
        if let Some(Value::String(displaced)) = previous {
            if displaced != source_id {
                if let (Some(link), Some(inverse)) = (&field.link, &field.inverse) {
                    remove_id(
                        tables,
                        self.schema.storage_name(link),
                        &displaced,
                        inverse,
                        target_id,
                    );
                }
            }
        }
    }

    /// Mirror a change of link ids on the inverse side
    fn sync_links(
        &self,
        tables: &mut Tables,
        source_id: &str,
        field: &StoreField,
        old: &[RecordId],
        new: &[RecordId],
    ) {
        let (Some(link), Some(inverse)) = (&field.link, &field.inverse) else {
            return;
        };
        let storage = self.schema.storage_name(link);
        for removed in old.iter().filter(|id| !new.contains(id)) {
            remove_id(tables, storage, removed, inverse, source_id);
        }
        for added in new.iter().filter(|id| !old.contains(id)) {
            self.attach(tables, link, added, inverse, source_id);
        }
    }

    fn collect(&self, tables: &Tables, storage: &str, ids: &[RecordId]) -> Vec<Record> {
        ids.iter()
            .filter_map(|id| tables.get(storage, id).cloned())
            .collect()
    }
}

/// Remove `value_id` from a link field of a stored record
fn remove_id(tables: &mut Tables, storage: &str, id: &str, field: &str, value_id: &str) {
    let Some(record) = tables.get_mut(storage, id) else {
        return;
    };
    match record.fields.get(field) {
        Some(Value::List(_)) => {
            let ids: Vec<RecordId> = record
                .link_ids(field)
                .into_iter()
                .filter(|linked| linked != value_id)
                .collect();
            record.fields.insert(field.to_string(), Value::id_list(ids));
        }
        Some(Value::String(linked)) if linked == value_id => {
            record.fields.remove(field);
        }
        _ => {}
    }
}

fn dedup(ids: Vec<RecordId>) -> Vec<RecordId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

// ============================================================================
// RecordStore implementation
// ============================================================================

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(
        &self,
        type_name: &str,
        ids: Option<&[RecordId]>,
        options: &QueryOptions,
    ) -> EngineResult<Vec<Record>> {
        let bucket = self.bucket(type_name)?;
        let allowed = self.schema.concrete_types(type_name);

        let mut options = options.clone();
        let lifted = options.predicate.as_mut().and_then(Predicate::take_id_match);
        let ids = lifted.or_else(|| ids.map(<[RecordId]>::to_vec));

        let tables = self.tables.read().await;
        let table = tables.table(&bucket.name);
        let candidates: Vec<Record> = match &ids {
            Some(ids) => dedup(ids.clone())
                .iter()
                .filter_map(|id| {
                    table
                        .iter()
                        .find(|r| &r.id == id && allowed.contains(&r.type_name))
                })
                .cloned()
                .collect(),
            None => table
                .iter()
                .filter(|r| allowed.contains(&r.type_name))
                .cloned()
                .collect(),
        };

        let found = options.apply(candidates);
        debug!(type_name, ids = ?ids, found = found.len(), "find");
        Ok(found)
    }

    async fn create(&self, type_name: &str, records: Vec<FieldMap>) -> EngineResult<Vec<Record>> {
        let bucket = self.bucket(type_name)?;
        if !self.schema.is_object(type_name) {
            return Err(EngineError::invalid_argument(format!(
                "Cannot create records of abstract type '{}'",
                type_name
            )));
        }

        let mut tables = self.tables.write().await;
        let mut prepared = Vec::with_capacity(records.len());
        let mut batch_ids = HashSet::new();

        for input in records {
            let id = match input.get(ID_FIELD) {
                Some(Value::String(id)) => id.clone(),
                Some(Value::Int(id)) => id.to_string(),
                _ => Uuid::new_v4().to_string(),
            };
            if tables.get(&bucket.name, &id).is_some() || !batch_ids.insert(id.clone()) {
                return Err(EngineError::store(
                    type_name,
                    format!("record '{}' already exists", id),
                ));
            }

            let mut record = Record::new(id, type_name);
            for (name, value) in input {
                if name == ID_FIELD || name == TYPENAME_FIELD {
                    continue;
                }
                let field = self.field(bucket, type_name, &name)?;
                let value = self.normalize(type_name, field, value)?;
                self.check_links(&tables, type_name, field, &value)?;
                if !value.is_null() {
                    record.fields.insert(name, value);
                }
            }
            prepared.push(record);
        }

        let ids: Vec<RecordId> = prepared.iter().map(|r| r.id.clone()).collect();
        for record in prepared {
            let links: Vec<(StoreField, Vec<RecordId>)> = record
                .fields
                .iter()
                .filter_map(|(name, value)| {
                    let field = bucket.fields.get(name)?;
                    field.is_link().then(|| (field.clone(), value.ids()))
                })
                .collect();
            let id = record.id.clone();
            tables.insert(&bucket.name, record);
            for (field, linked) in links {
                self.sync_links(&mut tables, &id, &field, &[], &linked);
            }
        }

        debug!(type_name, count = ids.len(), "create");
        Ok(self.collect(&tables, &bucket.name, &ids))
    }

    async fn update(
        &self,
        type_name: &str,
        updates: Vec<RecordUpdate>,
    ) -> EngineResult<Vec<Record>> {
        let bucket = self.bucket(type_name)?;
        let allowed = self.schema.concrete_types(type_name);
        let mut tables = self.tables.write().await;
        let mut ids = Vec::with_capacity(updates.len());

        for update in updates {
            let current = tables
                .get(&bucket.name, &update.id)
                .filter(|r| allowed.contains(&r.type_name))
                .cloned()
                .ok_or_else(|| {
                    EngineError::not_found(type_name, describe(&serde_json::json!({ ID_FIELD: update.id })))
                })?;
            let mut next = current.clone();

            for (name, value) in update.replace {
                let field = self.field(bucket, type_name, &name)?;
                let value = self.normalize(type_name, field, value)?;
                self.check_links(&tables, type_name, field, &value)?;
                if value.is_null() {
                    next.fields.remove(&name);
                } else {
                    next.fields.insert(name, value);
                }
            }

            for (name, value) in update.push {
                let field = self.field(bucket, type_name, &name)?;
                if !field.is_list() {
                    return Err(EngineError::invalid_argument(format!(
                        "Cannot push to non-list field '{}' on type '{}'",
                        name, type_name
                    )));
                }
                let value = self.normalize(type_name, field, value)?;
                self.check_links(&tables, type_name, field, &value)?;
                let mut items = next
                    .field(&name)
                    .and_then(Value::as_list)
                    .map(<[Value]>::to_vec)
                    .unwrap_or_default();
                for item in value.as_list().unwrap_or(&[]) {
                    if !items.contains(item) {
                        items.push(item.clone());
                    }
                }
                next.fields.insert(name, Value::List(items));
            }

            for (name, value) in update.pull {
                let field = self.field(bucket, type_name, &name)?;
                let value = self.normalize(type_name, field, value)?;
                let removed = match value {
                    Value::List(items) => items,
                    other => vec![other],
                };
                match next.fields.get(&name).cloned() {
                    Some(Value::List(items)) => {
                        let kept = items.into_iter().filter(|v| !removed.contains(v)).collect();
                        next.fields.insert(name, Value::List(kept));
                    }
                    Some(single) if removed.contains(&single) => {
                        next.fields.remove(&name);
                    }
                    _ => {}
                }
            }

            let changed_links: Vec<(StoreField, Vec<RecordId>, Vec<RecordId>)> = bucket
                .fields
                .values()
                .filter(|f| f.is_link())
                .filter_map(|f| {
                    let old = current.link_ids(&f.name);
                    let new = next.link_ids(&f.name);
                    (old != new).then(|| (f.clone(), old, new))
                })
                .collect();

            let id = next.id.clone();
            if let Some(slot) = tables.get_mut(&bucket.name, &id) {
                *slot = next;
            }
            for (field, old, new) in changed_links {
                self.sync_links(&mut tables, &id, &field, &old, &new);
            }
            ids.push(id);
        }

        debug!(type_name, count = ids.len(), "update");
        Ok(self.collect(&tables, &bucket.name, &ids))
    }

    async fn delete(&self, type_name: &str, ids: &[RecordId]) -> EngineResult<bool> {
        let bucket = self.bucket(type_name)?;
        let allowed = self.schema.concrete_types(type_name);
        let mut tables = self.tables.write().await;
        let mut all_found = true;

        for id in ids {
            let Some(record) = tables.remove(&bucket.name, id, allowed) else {
                all_found = false;
                continue;
            };
            for (name, value) in &record.fields {
                let Some(field) = bucket.fields.get(name) else {
                    continue;
                };
                if let (Some(link), Some(inverse)) = (&field.link, &field.inverse) {
                    let storage = self.schema.storage_name(link);
                    for linked in value.ids() {
                        remove_id(&mut tables, storage, &linked, inverse, id);
                    }
                }
            }
        }

        debug!(type_name, count = ids.len(), all_found, "delete");
        Ok(all_found)
    }

    fn get_link(&self, type_name: &str, field: &str) -> Option<String> {
        self.schema.link(type_name, field).map(str::to_string)
    }

    fn unique_fields(&self, type_name: &str) -> Vec<String> {
        self.schema.unique_fields(type_name).to_vec()
    }
}

// ============================================================================
// Tests
// ============================================================================
