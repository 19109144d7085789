//! Connection queries
//!
//! [`QueryEngine::find_all`] answers a root query for a type and
//! [`QueryEngine::resolve_relation`] answers a relation field of a record
//! returned by it, reusing what the first call cached.

use crate::cache::ResolutionCache;
use crate::connection::{Connection, PageArgs, paginate};
use crate::filter::{Filter, FilterTranslator, OrderBy};
use crate::store::{QueryOptions, RecordStore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strata_core::{EngineError, EngineResult, Record, RecordId};
use strata_schema::Schema;
use tracing::debug;

// ============================================================================
// QueryArgs
// ============================================================================

/// Arguments of a connection query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<RecordId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,

    #[serde(flatten)]
    pub page: PageArgs,
}

impl QueryArgs {
    /// Create empty arguments
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse arguments from JSON
    pub fn from_json(json: &serde_json::Value) -> EngineResult<Self> {
        serde_json::from_value(json.clone())
            .map_err(|e| EngineError::invalid_argument(format!("Invalid query arguments: {}", e)))
    }

    pub fn with_ids(mut self, ids: Vec<RecordId>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_page(mut self, page: PageArgs) -> Self {
        self.page = page;
        self
    }

    fn has_nested_conditions(&self) -> bool {
        self.filter.is_some() || self.order_by.is_some()
    }
}

/// A root query result and the records cached while producing it
#[derive(Debug)]
pub struct QueryResult {
    pub connection: Connection,
    pub cache: ResolutionCache,
}

// ============================================================================
// QueryEngine
// ============================================================================

/// Answers connection queries against a record store
pub struct QueryEngine<'a> {
    schema: &'a Schema,
    store: &'a dyn RecordStore,
}

impl<'a> QueryEngine<'a> {
    /// Create a query engine
    pub fn new(schema: &'a Schema, store: &'a dyn RecordStore) -> Self {
        Self { schema, store }
    }

    /// Query every record of a type
    ///
    /// Nested filters are resolved before the connection is windowed, so the
    /// page only ever holds records that pass them.
    pub async fn find_all(&self, type_name: &str, args: &QueryArgs) -> EngineResult<QueryResult> {
        self.schema.type_or_err(type_name)?;
        let translator = FilterTranslator::new(self.schema);
        let options = translator.options(
            args.filter.as_ref(),
            args.order_by.as_ref(),
            args.skip,
            type_name,
        )?;

        let records = self
            .store
            .find(type_name, args.ids.as_deref(), &options)
            .await?;
        let cache = ResolutionCache::new();
        cache.insert_records(records.iter().cloned()).await;

        let excluded = if args.has_nested_conditions() {
            translator
                .filter_nested(
                    self.store,
                    &cache,
                    args.filter.as_ref(),
                    args.order_by.as_ref(),
                    type_name,
                    &records,
                )
                .await?
        } else {
            HashSet::new()
        };
        let records = without(records, &excluded);

        debug!(type_name, found = records.len(), excluded = excluded.len(), "find_all");
        let connection = paginate(records, &args.page)?;
        Ok(QueryResult { connection, cache })
    }

    /// Resolve a relation field of a record returned by a query
    pub async fn resolve_relation(
        &self,
        root: &Record,
        field: &str,
        args: &QueryArgs,
        cache: &ResolutionCache,
    ) -> EngineResult<Connection> {
        let descriptor = self.schema.field(&root.type_name, field)?;
        let target = descriptor.type_name.as_str();
        if !self.schema.is_composite(target) {
            return Err(EngineError::invalid_argument(format!(
                "Field '{}' on type '{}' is not a relation",
                field, root.type_name
            )));
        }

        let translator = FilterTranslator::new(self.schema);
        let options = translator.options(
            args.filter.as_ref(),
            args.order_by.as_ref(),
            args.skip,
            target,
        )?;

        // Records a nested filter pass already narrowed down
        let mut result = match options.is_empty() {
            true => cache.field(&root.id, field).await.unwrap_or_default(),
            false => Vec::new(),
        };

        let mut missing = Vec::new();
        if result.is_empty() {
            for id in root.link_ids(field) {
                match cache.record(&id).await {
                    Some(record) => result.push(record),
                    None => missing.push(id),
                }
            }
        }

        let combine = !result.is_empty() && !options.is_empty();
        if !missing.is_empty() {
            let find_options = match combine {
                true => QueryOptions::default(),
                false => options.clone(),
            };
            let found = self
                .store
                .find(target, Some(&missing), &find_options)
                .await?;
            cache.insert_records(found.iter().cloned()).await;
            result.extend(found);
        }
        if combine {
            result = self.store.apply_options(target, result, &options);
        }

        if args.has_nested_conditions() {
            let excluded = translator
                .filter_nested(
                    self.store,
                    cache,
                    args.filter.as_ref(),
                    args.order_by.as_ref(),
                    target,
                    &result,
                )
                .await?;
            result = without(result, &excluded);
        }

        debug!(
            type_name = %root.type_name,
            field,
            found = result.len(),
            "resolve_relation"
        );
        paginate(result, &args.page)
    }
}

fn without(records: Vec<Record>, excluded: &HashSet<RecordId>) -> Vec<Record> {
    if excluded.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| !excluded.contains(&r.id))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SortKey};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strata_core::{FieldMap, Value};
    use strata_schema::{FieldDescriptor, TypeDescriptor};

    fn schema() -> Schema {
        Schema::new()
            .with_type(
                TypeDescriptor::object("Team")
                    .with_field(FieldDescriptor::new("name", "String"))
                    .with_field(FieldDescriptor::list("members", "Member")),
            )
            .with_type(
                TypeDescriptor::object("Member")
                    .with_field(FieldDescriptor::new("name", "String"))
                    .with_field(FieldDescriptor::new("active", "Boolean"))
                    .with_field(FieldDescriptor::new("joined", "Date"))
                    .with_field(FieldDescriptor::new("team", "Team")),
            )
    }

    fn fields(json: serde_json::Value) -> FieldMap {
        match Value::from(json) {
            Value::Object(map) => map,
            _ => FieldMap::new(),
        }
    }

    async fn seeded() -> (Schema, MemoryStore, Vec<Record>) {
        let schema = schema();
        let store = MemoryStore::from_schema(&schema).unwrap();
        let members = store
            .create(
                "Member",
                vec![
                    fields(json!({"name": "a", "active": true, "joined": "2021-01-01"})),
                    fields(json!({"name": "b", "active": false, "joined": "2022-01-01"})),
                    fields(json!({"name": "c", "active": true, "joined": "2023-01-01"})),
                    fields(json!({"name": "aa", "active": false, "joined": "2020-01-01"})),
                ],
            )
            .await
            .unwrap();
        let ids: Vec<_> = members.iter().map(|m| json!(m.id)).collect();
        store
            .create(
                "Team",
                vec![
                    fields(json!({"name": "red", "members": [ids[0], ids[1]]})),
                    fields(json!({"name": "blue", "members": [ids[3]]})),
                    fields(json!({"name": "grey"})),
                ],
            )
            .await
            .unwrap();
        (schema, store, members)
    }

    fn names(connection: &Connection) -> Vec<&str> {
        connection
            .nodes()
            .filter_map(|r| r.field("name").and_then(Value::as_str))
            .collect()
    }

    #[tokio::test]
    async fn test_find_all_sorts_and_paginates() {
        let (schema, store, _) = seeded().await;
        let args = QueryArgs::new()
            .with_order_by(OrderBy::new().with_direction("name", "DESC"))
            .with_page(PageArgs::new().with_first(2));

        let result = QueryEngine::new(&schema, &store)
            .find_all("Member", &args)
            .await
            .unwrap();
        assert_eq!(names(&result.connection), vec!["c", "b"]);
        assert!(result.connection.page_info.has_next_page);
        assert_eq!(result.connection.aggregate.count, 4);
    }

    #[tokio::test]
    async fn test_find_all_parses_date_ranges() {
        let (schema, store, _) = seeded().await;
        let args = QueryArgs::from_json(&json!({
            "filter": {"range": {"joined": ["2021-06-01", null]}},
            "orderBy": {"joined": "ASC"}
        }))
        .unwrap();

        let result = QueryEngine::new(&schema, &store)
            .find_all("Member", &args)
            .await
            .unwrap();
        assert_eq!(names(&result.connection), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_nested_filter_applies_before_paging() {
        let (schema, store, _) = seeded().await;
        let args = QueryArgs::from_json(&json!({
            "filter": {"members": {"match": {"active": true}}},
            "first": 5
        }))
        .unwrap();

        let result = QueryEngine::new(&schema, &store)
            .find_all("Team", &args)
            .await
            .unwrap();
        // grey has no members and fails the exists check; blue only has aa
        assert_eq!(names(&result.connection), vec!["red"]);
        assert_eq!(result.connection.aggregate.count, 1);
    }

    #[tokio::test]
    async fn test_resolve_relation_uses_filtered_cache() {
        let (schema, store, _) = seeded().await;
        let engine = QueryEngine::new(&schema, &store);
        let args = QueryArgs::from_json(&json!({"filter": {"members": {"match": {"active": true}}}}))
            .unwrap();
        let result = engine.find_all("Team", &args).await.unwrap();
        let red = result.connection.nodes().next().unwrap().clone();

        let members = engine
            .resolve_relation(&red, "members", &QueryArgs::new(), &result.cache)
            .await
            .unwrap();
        assert_eq!(names(&members), vec!["a"]);
    }

    #[tokio::test]
    async fn test_resolve_relation_applies_options() {
        let (schema, store, _) = seeded().await;
        let engine = QueryEngine::new(&schema, &store);
        let result = engine.find_all("Team", &QueryArgs::new()).await.unwrap();
        let red = result.connection.nodes().next().unwrap().clone();

        let all = engine
            .resolve_relation(&red, "members", &QueryArgs::new(), &result.cache)
            .await
            .unwrap();
        assert_eq!(names(&all), vec!["a", "b"]);

        let sorted = engine
            .resolve_relation(
                &red,
                "members",
                &QueryArgs::new().with_order_by(OrderBy::new().with_direction("name", "DESC")),
                &result.cache,
            )
            .await
            .unwrap();
        assert_eq!(names(&sorted), vec!["b", "a"]);

        let err = engine
            .resolve_relation(&red, "name", &QueryArgs::new(), &result.cache)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_negative_first_is_invalid() {
        let (schema, store, _) = seeded().await;
        let args = QueryArgs::new().with_page(PageArgs::new().with_first(-1));
        let err = QueryEngine::new(&schema, &store)
            .find_all("Member", &args)
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_query_args_from_json() {
        let args = QueryArgs::from_json(&json!({
            "ids": ["x"],
            "skip": 2,
            "after": "x",
            "last": 1,
            "orderBy": {"name": "ASC"}
        }))
        .unwrap();
        assert_eq!(args.ids, Some(vec!["x".to_string()]));
        assert_eq!(args.skip, Some(2));
        assert_eq!(args.page, PageArgs::new().with_after("x").with_last(1));
        assert_eq!(
            args.order_by.map(|o| o.sort_keys()),
            Some(vec![SortKey::ascending("name")])
        );
    }
}
