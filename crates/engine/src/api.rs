//! Data API facade
//!
//! [`DataApi`] owns a validated schema, its relation table and a record
//! store, and exposes the root operations over JSON inputs.

use crate::args::{ArgParser, MutationKind};
use crate::mutation::{MutationEngine, MutationPayload};
use crate::query::{QueryArgs, QueryEngine, QueryResult};
use crate::store::{MemoryStore, RecordStore, StoreSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use strata_core::{EngineResult, Validatable};
use strata_schema::{RelationTable, Schema, compute_relations};
use tracing::{info, warn};

// ============================================================================
// Operation
// ============================================================================

/// Root operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Upsert,
    Delete,
    Query,
}

impl OperationKind {
    fn mutation(self) -> Option<MutationKind> {
        match self {
            OperationKind::Create => Some(MutationKind::Create),
            OperationKind::Update => Some(MutationKind::Update),
            OperationKind::Upsert => Some(MutationKind::Upsert),
            OperationKind::Delete => Some(MutationKind::Delete),
            OperationKind::Query => None,
        }
    }
}

/// One root operation, as read from a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub op: OperationKind,

    #[serde(rename = "type")]
    pub type_name: String,

    /// Mutation input or query arguments
    #[serde(default)]
    pub input: Json,
}

impl Operation {
    pub fn new(op: OperationKind, type_name: impl Into<String>, input: Json) -> Self {
        Self {
            op,
            type_name: type_name.into(),
            input,
        }
    }
}

// ============================================================================
// DataApi
// ============================================================================

/// Schema, relations and store behind one set of root operations
pub struct DataApi<S: RecordStore> {
    schema: Schema,
    relations: RelationTable,
    store: S,
}

impl DataApi<MemoryStore> {
    /// Validate a schema and back it with an empty in-memory store
    pub fn in_memory(schema: Schema) -> EngineResult<Self> {
        schema.validate()?;
        let relations = compute_relations(&schema);
        let store = MemoryStore::new(StoreSchema::build(&schema, &relations)?);
        Ok(Self::from_parts(schema, relations, store))
    }
}

impl<S: RecordStore> DataApi<S> {
    /// Validate a schema and pair it with an existing store
    pub fn new(schema: Schema, store: S) -> EngineResult<Self> {
        schema.validate()?;
        let relations = compute_relations(&schema);
        Ok(Self::from_parts(schema, relations, store))
    }

    fn from_parts(schema: Schema, relations: RelationTable, store: S) -> Self {
        for warning in relations.warnings() {
            warn!(relation = %warning.relation, "{}", warning.message);
        }
        info!(
            types = schema.types().count(),
            relations = relations.len(),
            "Data API ready"
        );
        Self {
            schema,
            relations,
            store,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn relations(&self) -> &RelationTable {
        &self.relations
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a root mutation from its JSON input
    pub async fn mutate(
        &self,
        kind: MutationKind,
        type_name: &str,
        input: &Json,
    ) -> EngineResult<MutationPayload> {
        let input = ArgParser::new(&self.schema).parse_mutation(kind, type_name, input)?;
        MutationEngine::new(&self.store).mutate(input).await
    }

    pub async fn create(&self, type_name: &str, input: &Json) -> EngineResult<MutationPayload> {
        self.mutate(MutationKind::Create, type_name, input).await
    }

    pub async fn update(&self, type_name: &str, input: &Json) -> EngineResult<MutationPayload> {
        self.mutate(MutationKind::Update, type_name, input).await
    }

    pub async fn upsert(&self, type_name: &str, input: &Json) -> EngineResult<MutationPayload> {
        self.mutate(MutationKind::Upsert, type_name, input).await
    }

    pub async fn delete(&self, type_name: &str, input: &Json) -> EngineResult<MutationPayload> {
        self.mutate(MutationKind::Delete, type_name, input).await
    }

    /// Query a type as a connection
    pub async fn query(&self, type_name: &str, args: &QueryArgs) -> EngineResult<QueryResult> {
        QueryEngine::new(&self.schema, &self.store)
            .find_all(type_name, args)
            .await
    }

    /// Query engine over this API's schema and store
    pub fn query_engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(&self.schema, &self.store)
    }

    /// Run one operation and return its JSON result
    pub async fn execute(&self, operation: &Operation) -> EngineResult<Json> {
        match operation.op.mutation() {
            Some(kind) => Ok(self
                .mutate(kind, &operation.type_name, &operation.input)
                .await?
                .to_json()),
            None => {
                let args = match &operation.input {
                    Json::Null => QueryArgs::default(),
                    json => QueryArgs::from_json(json)?,
                };
                let result = self.query(&operation.type_name, &args).await?;
                Ok(result.connection.to_json())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use strata_core::Value;
    use strata_schema::{FieldDescriptor, TypeDescriptor};

    fn schema() -> Schema {
        Schema::new()
            .with_type(
                TypeDescriptor::object("Author")
                    .with_field(FieldDescriptor::new("name", "String").unique())
                    .with_field(FieldDescriptor::list("books", "Book")),
            )
            .with_type(
                TypeDescriptor::object("Book")
                    .with_field(FieldDescriptor::new("title", "String"))
                    .with_field(FieldDescriptor::new("author", "Author")),
            )
    }

    #[tokio::test]
    async fn test_create_then_query_relation() {
        let api = DataApi::in_memory(schema()).unwrap();
        let payload = api
            .create(
                "Author",
                &json!({
                    "data": {"name": "le guin", "books": {"create": [{"title": "lathe"}]}},
                    "clientMutationId": "m1"
                }),
            )
            .await
            .unwrap();
        assert_eq!(payload.client_mutation_id.as_deref(), Some("m1"));
        let author = payload.data.unwrap();

        let result = api.query("Book", &QueryArgs::new()).await.unwrap();
        let book = result.connection.nodes().next().unwrap().clone();
        assert_eq!(book.field("author"), Some(&Value::String(author.id.clone())));

        let authors = api
            .query_engine()
            .resolve_relation(&book, "author", &QueryArgs::new(), &result.cache)
            .await
            .unwrap();
        assert_eq!(authors.ids(), vec![author.id.as_str()]);
    }

    #[tokio::test]
    async fn test_execute_operations() {
        let api = DataApi::in_memory(schema()).unwrap();
        let create = Operation::new(
            OperationKind::Create,
            "Author",
            json!({"data": {"name": "butler"}}),
        );
        let created = api.execute(&create).await.unwrap();
        assert_eq!(created["data"]["name"], json!("butler"));

        let query: Operation = serde_json::from_value(json!({
            "op": "query",
            "type": "Author",
            "input": {"filter": {"match": {"name": "butler"}}}
        }))
        .unwrap();
        let connection = api.execute(&query).await.unwrap();
        assert_eq!(connection["aggregate"]["count"], json!(1));

        let delete = Operation::new(
            OperationKind::Delete,
            "Author",
            json!({"where": {"name": "butler"}}),
        );
        api.execute(&delete).await.unwrap();
        let connection = api
            .execute(&Operation::new(OperationKind::Query, "Author", Json::Null))
            .await
            .unwrap();
        assert_eq!(connection["aggregate"]["count"], json!(0));
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let bad = Schema::new().with_type(
            TypeDescriptor::object("Tag").with_field(FieldDescriptor::list("names", "String").unique()),
        );
        let err = DataApi::in_memory(bad).err();
        assert!(err.is_some_and(|e| e.is_schema()));
    }
}
