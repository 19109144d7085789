//! Filter and orderBy translation
//!
//! A [`Filter`] combines the logical keys `not`, `or`, `and`, `range`,
//! `match` and `exists` with per-field entries. Logical keys translate to a
//! store [`Predicate`]. A field entry first requires the field to exist; for
//! relation fields it also filters the related records, which is resolved in
//! process by [`FilterTranslator::filter_nested`].

use crate::cache::ResolutionCache;
use crate::store::{Predicate, QueryOptions, RecordStore, SortKey};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use std::collections::{BTreeMap, HashSet};
use strata_core::{
    EngineError, EngineResult, FieldMap, ID_FIELD, Record, RecordId, TYPENAME_FIELD, Value,
};
use strata_schema::{FieldDescriptor, Schema, TypeKind};
use tracing::debug;

/// Keys with logical meaning inside a filter
pub const LOGICAL_KEYS: [&str; 6] = ["not", "or", "and", "range", "match", "exists"];

/// Prefix for field entries whose name clashes with a logical key
pub const FIELD_PREFIX: &str = "f_";

// ============================================================================
// Filter
// ============================================================================

/// A structured record filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<Filter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<Filter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<Filter>>,

    /// Inclusive `[min, max]` per field; `null` leaves an end open
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub range: BTreeMap<String, (Json, Json)>,

    #[serde(default, rename = "match", skip_serializing_if = "BTreeMap::is_empty")]
    pub r#match: BTreeMap<String, Json>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exists: BTreeMap<String, bool>,

    /// Field entries
    #[serde(flatten)]
    pub fields: Map<String, Json>,
}

impl Filter {
    /// Create an empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a filter from JSON
    pub fn from_json(json: &Json) -> EngineResult<Self> {
        serde_json::from_value(json.clone())
            .map_err(|e| EngineError::invalid_argument(format!("Invalid filter: {}", e)))
    }

    pub fn with_match(mut self, field: impl Into<String>, value: impl Into<Json>) -> Self {
        self.r#match.insert(field.into(), value.into());
        self
    }

    pub fn with_range(
        mut self,
        field: impl Into<String>,
        min: impl Into<Json>,
        max: impl Into<Json>,
    ) -> Self {
        self.range.insert(field.into(), (min.into(), max.into()));
        self
    }

    pub fn with_exists(mut self, field: impl Into<String>, present: bool) -> Self {
        self.exists.insert(field.into(), present);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Json>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Entry for a field, by its name or its prefixed alias
    pub fn field(&self, name: &str) -> Option<&Json> {
        self.fields
            .get(name)
            .or_else(|| self.fields.get(&format!("{}{}", FIELD_PREFIX, name)))
    }
}

// ============================================================================
// OrderBy
// ============================================================================

/// Ordered map of field → direction, or field → nested orderBy for relation
/// fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderBy(pub Map<String, Json>);

impl OrderBy {
    /// Create an empty orderBy
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direction(mut self, field: impl Into<String>, direction: &str) -> Self {
        self.0.insert(field.into(), Json::String(direction.to_string()));
        self
    }

    pub fn with_nested(mut self, field: impl Into<String>, nested: OrderBy) -> Self {
        self.0.insert(field.into(), Json::Object(nested.0));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sort keys in declaration order; unknown directions are dropped
    pub fn sort_keys(&self) -> Vec<SortKey> {
        self.0
            .iter()
            .filter_map(|(field, direction)| {
                let ascending = parse_direction(direction.as_str()?)?;
                Some(SortKey {
                    field: field.clone(),
                    ascending,
                })
            })
            .collect()
    }

    /// Nested orderBy for a relation field
    pub fn nested(&self, name: &str) -> Option<OrderBy> {
        self.0
            .get(name)
            .or_else(|| self.0.get(&format!("{}{}", FIELD_PREFIX, name)))
            .and_then(Json::as_object)
            .map(|nested| OrderBy(nested.clone()))
    }
}

/// Map a direction string to ascending (`true`) or descending (`false`)
pub fn parse_direction(direction: &str) -> Option<bool> {
    match direction {
        "ASC" | "ASCENDING" => Some(true),
        "DESC" | "DESCENDING" => Some(false),
        _ => None,
    }
}

fn json_truthy(json: &Json) -> bool {
    match json {
        Json::Null => false,
        Json::Bool(b) => *b,
        Json::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Json::String(s) => !s.is_empty(),
        Json::Array(_) | Json::Object(_) => true,
    }
}

// ============================================================================
// FilterTranslator
// ============================================================================

/// Translates filters and orderBy specs for one schema
pub struct FilterTranslator<'a> {
    schema: &'a Schema,
}

impl<'a> FilterTranslator<'a> {
    /// Create a translator for a schema
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Add `exists: {field: true}` for every top-level field entry
    ///
    /// The condition is appended to `and` when the filter has one.
    pub fn rewrite_exists(&self, filter: &Filter, type_name: &str) -> Filter {
        let mut filter = filter.clone();
        if !self.is_filterable(type_name) {
            return filter;
        }
        let Some(ty) = self.schema.get_type(type_name) else {
            return filter;
        };

        for field in &ty.fields {
            if LOGICAL_KEYS.contains(&field.name.as_str()) {
                continue;
            }
            if !filter.fields.get(&field.name).is_some_and(json_truthy) {
                continue;
            }
            match filter.and.as_mut() {
                Some(and) => and.push(Filter::new().with_exists(field.name.clone(), true)),
                None => {
                    filter.exists.insert(field.name.clone(), true);
                }
            }
        }
        filter
    }

    /// Translate a filter into a store predicate
    ///
    /// Returns `None` when the filter places no condition on the records.
    pub fn parse_filter(&self, filter: &Filter, type_name: &str) -> EngineResult<Option<Predicate>> {
        let filter = self.rewrite_exists(filter, type_name);
        self.predicate(&filter, type_name)
    }

    /// Store options for a filter, an orderBy and a skip count
    pub fn options(
        &self,
        filter: Option<&Filter>,
        order_by: Option<&OrderBy>,
        skip: Option<usize>,
        type_name: &str,
    ) -> EngineResult<QueryOptions> {
        let mut options = QueryOptions::new();
        if let Some(filter) = filter {
            options.predicate = self.parse_filter(filter, type_name)?;
        }
        if let Some(order_by) = order_by {
            options.sort = order_by.sort_keys();
        }
        options.offset = skip.unwrap_or_default();
        Ok(options)
    }

    fn predicate(&self, filter: &Filter, type_name: &str) -> EngineResult<Option<Predicate>> {
        let mut parts = Vec::new();

        if !filter.r#match.is_empty() {
            let mut fields = FieldMap::new();
            for (name, value) in &filter.r#match {
                fields.insert(name.clone(), self.scalar(type_name, name, value)?);
            }
            parts.push(Predicate::Match(fields));
        }

        if !filter.range.is_empty() {
            let mut ranges = BTreeMap::new();
            for (name, (min, max)) in &filter.range {
                ranges.insert(
                    name.clone(),
                    (
                        self.scalar(type_name, name, min)?,
                        self.scalar(type_name, name, max)?,
                    ),
                );
            }
            parts.push(Predicate::Range(ranges));
        }

        if !filter.exists.is_empty() {
            for name in filter.exists.keys() {
                self.check_field(type_name, name)?;
            }
            parts.push(Predicate::Exists(filter.exists.clone()));
        }

        if let Some(and) = &filter.and {
            parts.push(Predicate::And(self.predicates(and, type_name)?));
        }

        if let Some(or) = &filter.or {
            parts.push(Predicate::Or(self.predicates(or, type_name)?));
        }

        if let Some(not) = &filter.not {
            let inner = self
                .predicate(not, type_name)?
                .unwrap_or_else(|| Predicate::And(Vec::new()));
            parts.push(Predicate::Not(Box::new(inner)));
        }

        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::And(parts)),
        })
    }

    fn predicates(&self, filters: &[Filter], type_name: &str) -> EngineResult<Vec<Predicate>> {
        filters
            .iter()
            .map(|f| {
                Ok(self
                    .predicate(f, type_name)?
                    .unwrap_or_else(|| Predicate::And(Vec::new())))
            })
            .collect()
    }

    fn check_field(&self, type_name: &str, name: &str) -> EngineResult<Option<&'a FieldDescriptor>> {
        if name == ID_FIELD || name == TYPENAME_FIELD || !self.is_filterable(type_name) {
            return Ok(None);
        }
        self.schema.field(type_name, name).map(Some).map_err(|_| {
            EngineError::invalid_argument(format!(
                "Cannot filter on unknown field '{}' of type '{}'",
                name, type_name
            ))
        })
    }

    fn scalar(&self, type_name: &str, name: &str, json: &Json) -> EngineResult<Value> {
        let value = Value::from(json.clone());
        let Some(field) = self.check_field(type_name, name)? else {
            return Ok(value);
        };
        Ok(match self.schema.scalar_kind(&field.type_name) {
            Some(kind) if json_truthy(json) => kind.parse_value(value),
            _ => value,
        })
    }

    fn is_filterable(&self, type_name: &str) -> bool {
        self.schema
            .get_type(type_name)
            .is_some_and(|t| matches!(t.kind, TypeKind::Object | TypeKind::Interface))
    }

    // ========================================================================
    // Nested filtering
    // ========================================================================

    /// Resolve filters and orderBy entries on relation fields
    ///
    /// For every candidate, related records are fetched with the nested
    /// filter and orderBy applied (recursively). Candidates whose related
    /// records all fail are returned as excluded. Surviving related records
    /// are cached: by id for singular fields, per parent field for lists.
    pub fn filter_nested<'f>(
        &'f self,
        store: &'f dyn RecordStore,
        cache: &'f ResolutionCache,
        filter: Option<&'f Filter>,
        order_by: Option<&'f OrderBy>,
        type_name: &'f str,
        candidates: &'f [Record],
    ) -> BoxFuture<'f, EngineResult<HashSet<RecordId>>> {
        async move {
            let mut excluded = HashSet::new();
            if (filter.is_none() && order_by.is_none()) || !self.is_filterable(type_name) {
                return Ok(excluded);
            }
            let Some(ty) = self.schema.get_type(type_name) else {
                return Ok(excluded);
            };

            let mut nested = Vec::new();
            for field in &ty.fields {
                if !self.schema.is_composite(&field.type_name) {
                    continue;
                }
                let child_filter = match filter.and_then(|f| f.field(&field.name)) {
                    Some(json @ Json::Object(_)) => Some(Filter::from_json(json)?),
                    _ => None,
                };
                let child_order = order_by.and_then(|o| o.nested(&field.name));
                if child_filter.is_some() || child_order.is_some() {
                    nested.push((field, child_filter, child_order));
                }
            }
            if nested.is_empty() {
                return Ok(excluded);
            }

            let tasks = nested.iter().flat_map(|(field, child_filter, child_order)| {
                candidates.iter().map(move |root| {
                    self.filter_child(
                        store,
                        cache,
                        root,
                        field,
                        child_filter.as_ref(),
                        child_order.as_ref(),
                    )
                })
            });
            for result in join_all(tasks).await {
                if let Some(id) = result? {
                    excluded.insert(id);
                }
            }

            debug!(
                type_name = %type_name,
                candidates = candidates.len(),
                excluded = excluded.len(),
                "Applied nested filters"
            );
            Ok(excluded)
        }
        .boxed()
    }

    /// Returns the root id when none of its related records survive
    async fn filter_child(
        &self,
        store: &dyn RecordStore,
        cache: &ResolutionCache,
        root: &Record,
        field: &FieldDescriptor,
        child_filter: Option<&Filter>,
        child_order: Option<&OrderBy>,
    ) -> EngineResult<Option<RecordId>> {
        let child_ids = root.link_ids(&field.name);
        if child_ids.is_empty() {
            return Ok(None);
        }

        let options = self.options(child_filter, child_order, None, &field.type_name)?;
        let children = store
            .find(&field.type_name, Some(&child_ids), &options)
            .await?;
        let deeper = self
            .filter_nested(
                store,
                cache,
                child_filter,
                child_order,
                &field.type_name,
                &children,
            )
            .await?;
        let children: Vec<Record> = children
            .into_iter()
            .filter(|child| !deeper.contains(&child.id))
            .collect();

        if children.is_empty() {
            return Ok(Some(root.id.clone()));
        }
        if field.is_list() {
            cache.set_field(&root.id, &field.name, children).await;
        } else {
            cache.insert_records(children).await;
        }
        Ok(None)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strata_schema::TypeDescriptor;

    fn schema() -> Schema {
        Schema::new()
            .with_type(
                TypeDescriptor::object("Parent")
                    .with_field(FieldDescriptor::new("name", "String"))
                    .with_field(FieldDescriptor::new("born", "DateTime"))
                    .with_field(FieldDescriptor::new("child", "Child"))
                    .with_field(FieldDescriptor::list("toys", "Toy")),
            )
            .with_type(
                TypeDescriptor::object("Child")
                    .with_field(FieldDescriptor::new("flag", "Boolean"))
                    .with_field(FieldDescriptor::new("parent", "Parent")),
            )
            .with_type(
                TypeDescriptor::object("Toy")
                    .with_field(FieldDescriptor::new("label", "String"))
                    .with_field(FieldDescriptor::new("rank", "Int"))
                    .with_field(FieldDescriptor::new("owner", "Parent")),
            )
    }

    fn record(fields: Json) -> FieldMap {
        match Value::from(fields) {
            Value::Object(map) => map,
            _ => FieldMap::new(),
        }
    }

    #[test]
    fn test_field_entry_adds_exists() {
        let schema = schema();
        let filter = Filter::from_json(&json!({"name": "x", "match": {"born": "2020-01-01"}})).unwrap();
        let rewritten = FilterTranslator::new(&schema).rewrite_exists(&filter, "Parent");

        assert_eq!(rewritten.exists.get("name"), Some(&true));
        assert!(rewritten.r#match.contains_key("born"));
        assert_eq!(rewritten.fields.get("name"), Some(&json!("x")));
    }

    #[test]
    fn test_field_entry_appends_to_and() {
        let schema = schema();
        let filter = Filter::from_json(&json!({"name": "x", "and": [{"match": {"name": "y"}}]})).unwrap();
        let rewritten = FilterTranslator::new(&schema).rewrite_exists(&filter, "Parent");

        assert!(rewritten.exists.is_empty());
        let and = rewritten.and.unwrap();
        assert_eq!(and.len(), 2);
        assert_eq!(and[1].exists.get("name"), Some(&true));
    }

    #[test]
    fn test_parse_filter_builds_predicate() {
        let schema = schema();
        let filter = Filter::new()
            .with_match("name", "Ann")
            .with_range("born", "2020-01-01", Json::Null);
        let predicate = FilterTranslator::new(&schema)
            .parse_filter(&filter, "Parent")
            .unwrap()
            .unwrap();

        let Predicate::And(parts) = predicate else {
            panic!("expected a conjunction");
        };
        assert_eq!(parts[0], Predicate::field_eq("name", "Ann"));
        let Predicate::Range(ranges) = &parts[1] else {
            panic!("expected a range");
        };
        assert!(matches!(ranges.get("born"), Some((Value::DateTime(_), Value::Null))));
    }

    #[test]
    fn test_empty_filter_has_no_predicate() {
        let schema = schema();
        let translator = FilterTranslator::new(&schema);
        assert_eq!(translator.parse_filter(&Filter::new(), "Parent").unwrap(), None);

        let err = translator
            .parse_filter(&Filter::new().with_match("nickname", "x"), "Parent")
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_prefixed_field_alias() {
        let filter = Filter::from_json(&json!({"f_child": {"flag": true}})).unwrap();
        assert_eq!(filter.field("child"), Some(&json!({"flag": true})));
    }

    #[test]
    fn test_order_by_directions() {
        let order_by: OrderBy =
            serde_json::from_value(json!({"rank": "DESC", "label": "ASCENDING", "x": "sideways", "owner": {"name": "ASC"}}))
                .unwrap();
        assert_eq!(
            order_by.sort_keys(),
            vec![SortKey::descending("rank"), SortKey::ascending("label")]
        );
        assert_eq!(
            order_by.nested("owner").map(|o| o.sort_keys()),
            Some(vec![SortKey::ascending("name")])
        );
    }

    #[tokio::test]
    async fn test_nested_filter_excludes_roots() {
        let schema = schema();
        let store = MemoryStore::from_schema(&schema).unwrap();
        let kids = store
            .create(
                "Child",
                vec![record(json!({"flag": true})), record(json!({"flag": false}))],
            )
            .await
            .unwrap();
        let parents = store
            .create(
                "Parent",
                vec![
                    record(json!({"name": "a", "child": kids[0].id})),
                    record(json!({"name": "b", "child": kids[1].id})),
                    record(json!({"name": "c"})),
                ],
            )
            .await
            .unwrap();

        let filter = Filter::from_json(&json!({"child": {"match": {"flag": true}}})).unwrap();
        let cache = ResolutionCache::new();
        let excluded = FilterTranslator::new(&schema)
            .filter_nested(&store, &cache, Some(&filter), None, "Parent", &parents)
            .await
            .unwrap();

        assert_eq!(excluded, HashSet::from([parents[1].id.clone()]));
        assert!(cache.record(&kids[0].id).await.is_some());
    }

    #[tokio::test]
    async fn test_nested_list_filter_caches_per_parent() {
        let schema = schema();
        let store = MemoryStore::from_schema(&schema).unwrap();
        let toys = store
            .create(
                "Toy",
                vec![
                    record(json!({"label": "ball", "rank": 2})),
                    record(json!({"label": "kite", "rank": 5})),
                    record(json!({"label": "yoyo", "rank": 9})),
                ],
            )
            .await
            .unwrap();
        let ids: Vec<Json> = toys.iter().map(|t| json!(t.id)).collect();
        let parents = store
            .create("Parent", vec![record(json!({"name": "a", "toys": ids}))])
            .await
            .unwrap();

        let filter = Filter::from_json(&json!({"toys": {"range": {"rank": [3, null]}}})).unwrap();
        let order_by = OrderBy::new().with_nested("toys", OrderBy::new().with_direction("rank", "DESC"));
        let cache = ResolutionCache::new();
        let excluded = FilterTranslator::new(&schema)
            .filter_nested(
                &store,
                &cache,
                Some(&filter),
                Some(&order_by),
                "Parent",
                &parents,
            )
            .await
            .unwrap();

        assert!(excluded.is_empty());
        let cached = cache.field(&parents[0].id, "toys").await.unwrap();
        let labels: Vec<_> = cached
            .iter()
            .filter_map(|t| t.field("label").and_then(Value::as_str))
            .collect();
        assert_eq!(labels, vec!["yoyo", "kite"]);
    }
}
