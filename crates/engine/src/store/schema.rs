//! Store schema
//!
//! Converts a `Schema` and its `RelationTable` into the per-storage field
//! definitions a record store works with. Types that share an interface or
//! union are stored together in one bucket named after every participating
//! type; records keep their concrete type name.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use strata_core::{Cardinality, EngineResult, ScalarKind, Validatable};
use strata_schema::naming::shared_storage_name;
use strata_schema::{RelationEndpoint, RelationTable, Schema, TypeKind};
use tracing::{debug, error};

// ============================================================================
// StoreField
// ============================================================================

/// A field as the store sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreField {
    /// Field name
    pub name: String,

    /// Declared target type
    pub type_name: String,

    /// Single value or list
    pub cardinality: Cardinality,

    /// Scalar kind, for non-relation fields
    pub scalar: Option<ScalarKind>,

    /// Target type for relation fields
    pub link: Option<String>,

    /// Field on the linked records that mirrors this one
    pub inverse: Option<String>,
}

impl StoreField {
    /// Check if this field links to other records
    pub fn is_link(&self) -> bool {
        self.link.is_some()
    }

    /// Check if the field holds a list
    pub fn is_list(&self) -> bool {
        self.cardinality.is_list()
    }
}

// ============================================================================
// StorageBucket
// ============================================================================

/// Field definitions for one storage bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageBucket {
    /// Bucket name
    pub name: String,

    /// Concrete types stored in the bucket
    pub types: BTreeSet<String>,

    /// Fields, keyed by name
    pub fields: BTreeMap<String, StoreField>,
}

// ============================================================================
// StoreSchema
// ============================================================================

/// Storage layout derived from a schema
#[derive(Debug, Clone, Default)]
pub struct StoreSchema {
    /// Type name → bucket name, for every type sharing a bucket
    storage_names: HashMap<String, String>,

    /// Bucket name → definitions
    buckets: BTreeMap<String, StorageBucket>,

    /// Concrete type → unique field names
    unique_indexes: HashMap<String, Vec<String>>,

    /// Any type → concrete types it may resolve to
    concrete_types: HashMap<String, Vec<String>>,
}

impl StoreSchema {
    /// Build the storage layout
    ///
    /// Fails when schema validation reports errors.
    pub fn build(schema: &Schema, relations: &RelationTable) -> EngineResult<Self> {
        schema.validate()?;

        let mut store = Self {
            storage_names: shared_storage_names(schema),
            ..Self::default()
        };

        for ty in schema.types() {
            if ty.kind.is_composite() {
                store
                    .concrete_types
                    .insert(ty.name.clone(), schema.possible_types(&ty.name));
            }
        }

        for ty in schema.object_types() {
            let storage = store.storage_name(&ty.name).to_string();
            let mut fields = Vec::with_capacity(ty.fields.len());

            for field in &ty.fields {
                if field.unique {
                    store
                        .unique_indexes
                        .entry(ty.name.clone())
                        .or_default()
                        .push(field.name.clone());
                }

                let link = schema
                    .is_composite(&field.type_name)
                    .then(|| field.type_name.clone());
                let inverse = link
                    .as_ref()
                    .and_then(|_| find_inverse(schema, relations, &ty.name, &field.name))
                    .map(|endpoint| endpoint.field.clone());

                fields.push(StoreField {
                    name: field.name.clone(),
                    type_name: field.type_name.clone(),
                    cardinality: field.cardinality,
                    scalar: schema.scalar_kind(&field.type_name),
                    link,
                    inverse,
                });
            }

            let bucket = store
                .buckets
                .entry(storage.clone())
                .or_insert_with(|| StorageBucket {
                    name: storage.clone(),
                    ..StorageBucket::default()
                });
            bucket.types.insert(ty.name.clone());

            for field in fields {
                match bucket.fields.get(&field.name) {
                    None => {
                        bucket.fields.insert(field.name.clone(), field);
                    }
                    Some(existing) if existing == &field => {}
                    Some(existing) => {
                        error!(
                            storage = %storage,
                            field = %field.name,
                            current = ?existing,
                            new = ?field,
                            "Bad schema: types sharing a union or interface define the same field differently"
                        );
                    }
                }
            }
        }

        debug!(buckets = store.buckets.len(), "Built store schema");
        Ok(store)
    }

    /// Bucket a type is stored in
    pub fn storage_name<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.storage_names
            .get(type_name)
            .map(String::as_str)
            .unwrap_or(type_name)
    }

    /// Bucket definitions for a type
    pub fn bucket(&self, type_name: &str) -> Option<&StorageBucket> {
        self.buckets.get(self.storage_name(type_name))
    }

    /// Iterate over all buckets
    pub fn buckets(&self) -> impl Iterator<Item = &StorageBucket> {
        self.buckets.values()
    }

    /// Field definition of a type
    pub fn field(&self, type_name: &str, field: &str) -> Option<&StoreField> {
        self.bucket(type_name)?.fields.get(field)
    }

    /// Target type linked by a relation field
    pub fn link(&self, type_name: &str, field: &str) -> Option<&str> {
        self.field(type_name, field)?.link.as_deref()
    }

    /// Unique fields of a concrete type
    pub fn unique_fields(&self, type_name: &str) -> &[String] {
        self.unique_indexes
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Concrete types a type name may resolve to
    pub fn concrete_types(&self, type_name: &str) -> &[String] {
        self.concrete_types
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check if a concrete type can be stored
    pub fn is_object(&self, type_name: &str) -> bool {
        self.bucket(type_name)
            .is_some_and(|b| b.types.contains(type_name))
    }
}

/// Group types that share an abstract parent and name their shared bucket
fn shared_storage_names(schema: &Schema) -> HashMap<String, String> {
    let mut groups: Vec<BTreeSet<String>> = Vec::new();

    for ty in schema.types().filter(|t| t.is_abstract()) {
        let members = schema.possible_types(&ty.name);
        if members.is_empty() {
            continue;
        }

        let mut group: BTreeSet<String> = BTreeSet::new();
        group.insert(ty.name.clone());
        for member in &members {
            group.insert(member.clone());
            if let Some(member_ty) = schema.get_type(member) {
                group.extend(member_ty.interfaces.iter().cloned());
            }
        }

        // Merge with every group already sharing a type
        let (overlapping, rest): (Vec<_>, Vec<_>) =
            groups.into_iter().partition(|g| !g.is_disjoint(&group));
        for other in overlapping {
            group.extend(other);
        }
        groups = rest;
        groups.push(group);
    }

    let mut names = HashMap::new();
    for group in groups {
        let name = shared_storage_name(group.iter().map(String::as_str));
        for type_name in group {
            names.insert(type_name, name.clone());
        }
    }
    names
}

/// Inverse of a field, looking through the declaring type's interfaces
fn find_inverse<'a>(
    schema: &Schema,
    relations: &'a RelationTable,
    type_name: &str,
    field: &str,
) -> Option<&'a RelationEndpoint> {
    relations.inverse_without_name(type_name, field).or_else(|| {
        let ty = schema.get_type(type_name)?;
        let mut parents: Vec<&str> = ty.interfaces.iter().map(String::as_str).collect();
        parents.extend(
            schema
                .types()
                .filter(|t| t.kind == TypeKind::Union && t.possible_types.contains(&ty.name))
                .map(|t| t.name.as_str()),
        );
        parents
            .into_iter()
            .find_map(|parent| relations.inverse_without_name(parent, field))
    })
}

// ============================================================================
// Tests
// ============================================================================
