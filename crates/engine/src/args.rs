//! Mutation argument trees
//!
//! JSON inputs are validated against the schema here and turned into typed
//! buckets before they reach the mutation engine. Unknown fields and unknown
//! bucket keys are rejected, and scalar values go through their field's
//! scalar parser.

use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use strata_core::{EngineError, EngineResult, FieldMap, ID_FIELD, Value};
use strata_schema::{FieldDescriptor, Schema};

// ============================================================================
// MutationKind
// ============================================================================

/// Root mutation entry points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Upsert,
    Delete,
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Update => write!(f, "update"),
            MutationKind::Upsert => write!(f, "upsert"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

// ============================================================================
// Argument buckets
// ============================================================================

/// A record payload: plain values plus nested relation arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordInput {
    pub fields: BTreeMap<String, InputValue>,
}

impl RecordInput {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain value
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.into(), InputValue::Value(value.into()));
        self
    }

    /// Add a nested relation argument
    pub fn with_nested(mut self, field: impl Into<String>, nested: NestedInput) -> Self {
        self.fields.insert(field.into(), InputValue::Nested(nested));
        self
    }

    pub fn has_nested(&self) -> bool {
        self.fields
            .values()
            .any(|value| matches!(value, InputValue::Nested(_)))
    }

    /// Plain values only, as checked by the uniqueness gate
    pub fn scalar_projection(&self) -> FieldMap {
        self.fields
            .iter()
            .filter_map(|(name, value)| match value {
                InputValue::Value(v) => Some((name.clone(), v.clone())),
                InputValue::Nested(_) => None,
            })
            .collect()
    }
}

/// One entry of a record payload
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Scalar value or raw link ids
    Value(Value),
    /// Nested relation arguments
    Nested(NestedInput),
}

/// Nested arguments for a relation field
#[derive(Debug, Clone, PartialEq)]
pub struct NestedInput {
    /// Declared target type of the field
    pub target: String,

    /// Whether the field holds a list
    pub list: bool,

    /// Arguments, per concrete type for abstract targets
    pub args: NestedArgs,
}

/// Arguments under a relation field
#[derive(Debug, Clone, PartialEq)]
pub enum NestedArgs {
    /// Arguments for the declared target type
    Concrete(MutationArgs),
    /// Arguments keyed by concrete type for an interface or union target
    Polymorphic(Vec<(String, MutationArgs)>),
}

/// One entry of the update bucket
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateInput {
    /// Payload applied to the record already selected
    Data(RecordInput),
    /// Payload applied to the record matching `where`
    WithWhere { data: RecordInput, r#where: FieldMap },
}

/// One entry of the upsert bucket
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertInput {
    /// Lookup for the existing record; absent for a nested singular relation
    pub r#where: Option<FieldMap>,
    pub create: RecordInput,
    pub update: RecordInput,
}

/// One entry of the delete bucket
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteSpec {
    /// `true`: delete whatever the parent links
    Linked,
    /// Delete the record matching a unique lookup
    Where(FieldMap),
}

/// One entry of the disconnect bucket
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectSpec {
    /// `true`: clear the parent's field
    Linked,
    /// Remove the record matching a unique lookup from the parent's field
    Where(FieldMap),
}

/// How the record targeted by updates is found
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// The current record is already the target
    Current,
    /// Look the target up by unique values
    Unique(FieldMap),
}

/// The typed argument buckets of one mutation node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationArgs {
    pub create: Vec<RecordInput>,
    pub update: Vec<UpdateInput>,
    pub upsert: Vec<UpsertInput>,
    pub delete: Vec<DeleteSpec>,
    pub connect: Vec<FieldMap>,
    pub disconnect: Vec<DisconnectSpec>,
    pub selector: Option<Selector>,
}

impl MutationArgs {
    /// Create empty arguments
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_create(mut self, input: RecordInput) -> Self {
        self.create.push(input);
        self
    }

    pub fn with_update(mut self, input: UpdateInput) -> Self {
        self.update.push(input);
        self
    }

    pub fn with_upsert(mut self, input: UpsertInput) -> Self {
        self.upsert.push(input);
        self
    }

    pub fn with_delete(mut self, spec: DeleteSpec) -> Self {
        self.delete.push(spec);
        self
    }

    pub fn with_connect(mut self, unique: FieldMap) -> Self {
        self.connect.push(unique);
        self
    }

    pub fn with_disconnect(mut self, spec: DisconnectSpec) -> Self {
        self.disconnect.push(spec);
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Check if no bucket holds anything
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update.is_empty()
            && self.upsert.is_empty()
            && self.delete.is_empty()
            && self.connect.is_empty()
            && self.disconnect.is_empty()
    }
}

/// A parsed root mutation
#[derive(Debug, Clone, PartialEq)]
pub struct MutationInput {
    pub kind: MutationKind,
    pub type_name: String,
    pub args: MutationArgs,
    pub client_mutation_id: Option<String>,
}

// ============================================================================
// ArgParser
// ============================================================================

/// Validates JSON argument trees against a schema
pub struct ArgParser<'a> {
    schema: &'a Schema,
}

impl<'a> ArgParser<'a> {
    /// Create a parser for a schema
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Parse a root mutation input
    ///
    /// Shapes: create `{data}`, update `{data, where}`, upsert
    /// `{where, create, update}`, delete `{where}`; each may carry a
    /// `clientMutationId`.
    pub fn parse_mutation(
        &self,
        kind: MutationKind,
        type_name: &str,
        input: &Json,
    ) -> EngineResult<MutationInput> {
        let ty = self.schema.type_or_err(type_name)?;
        if !ty.kind.is_composite() {
            return Err(EngineError::invalid_argument(format!(
                "Cannot {} values of non-record type '{}'",
                kind, type_name
            )));
        }

        let input = as_object(input, &format!("{} input", kind))?;
        let allowed: &[&str] = match kind {
            MutationKind::Create => &["data", "clientMutationId"],
            MutationKind::Update => &["data", "where", "clientMutationId"],
            MutationKind::Upsert => &["where", "create", "update", "clientMutationId"],
            MutationKind::Delete => &["where", "clientMutationId"],
        };
        check_keys(input, allowed, &format!("{} input", kind))?;

        let client_mutation_id = match input.get("clientMutationId") {
            None | Some(Json::Null) => None,
            Some(Json::String(id)) => Some(id.clone()),
            Some(other) => Some(other.to_string()),
        };

        let args = match kind {
            MutationKind::Create => {
                let data = required(input, "data")?;
                MutationArgs::new().with_create(self.record_input(type_name, data)?)
            }
            MutationKind::Update => {
                let data = self.record_input(type_name, required(input, "data")?)?;
                let r#where = self.where_clause(type_name, required(input, "where")?)?;
                MutationArgs::new()
                    .with_update(UpdateInput::Data(data))
                    .with_selector(Selector::Unique(r#where))
            }
            MutationKind::Upsert => MutationArgs::new().with_upsert(UpsertInput {
                r#where: Some(self.where_clause(type_name, required(input, "where")?)?),
                create: self.optional_record(type_name, input.get("create"))?,
                update: self.optional_record(type_name, input.get("update"))?,
            }),
            MutationKind::Delete => {
                let r#where = self.where_clause(type_name, required(input, "where")?)?;
                MutationArgs::new().with_delete(DeleteSpec::Where(r#where))
            }
        };

        Ok(MutationInput {
            kind,
            type_name: type_name.to_string(),
            args,
            client_mutation_id,
        })
    }

    /// Parse a record payload for a type
    pub fn record_input(&self, type_name: &str, json: &Json) -> EngineResult<RecordInput> {
        let object = as_object(json, &format!("{} data", type_name))?;
        let mut input = RecordInput::new();

        for (name, value) in object {
            if name == ID_FIELD {
                input
                    .fields
                    .insert(name.clone(), InputValue::Value(Value::from(value.clone())));
                continue;
            }

            let field = self.known_field(type_name, name)?;
            let entry = if self.schema.is_composite(&field.type_name) {
                match value {
                    Json::Object(_) => InputValue::Nested(self.nested(field, value)?),
                    Json::Null | Json::String(_) => InputValue::Value(Value::from(value.clone())),
                    Json::Array(items) if items.iter().all(Json::is_string) => {
                        InputValue::Value(Value::from(value.clone()))
                    }
                    _ => {
                        return Err(EngineError::invalid_argument(format!(
                            "Relation field '{}' on type '{}' expects nested arguments or ids",
                            name, type_name
                        )));
                    }
                }
            } else {
                InputValue::Value(self.scalar(field, value))
            };
            input.fields.insert(name.clone(), entry);
        }

        Ok(input)
    }

    /// Parse a unique lookup for a type
    pub fn where_clause(&self, type_name: &str, json: &Json) -> EngineResult<FieldMap> {
        let object = as_object(json, &format!("{} where", type_name))?;
        let mut clause = FieldMap::new();
        for (name, value) in object {
            let parsed = if name == ID_FIELD {
                Value::from(value.clone())
            } else {
                self.scalar(self.known_field(type_name, name)?, value)
            };
            clause.insert(name.clone(), parsed);
        }
        Ok(clause)
    }

    // ========================================================================
    // Nested arguments
    // ========================================================================

    fn nested(&self, field: &FieldDescriptor, json: &Json) -> EngineResult<NestedInput> {
        let target = &field.type_name;
        let list = field.is_list();

        let args = if self.schema.is_abstract(target) {
            let possible = self.schema.possible_types(target);
            let object = as_object(json, &format!("{} argument", field.name))?;
            let mut per_type = Vec::with_capacity(object.len());
            for (key, value) in object {
                let concrete = self
                    .schema
                    .concrete_type_for_key(key)
                    .filter(|t| possible.contains(&t.name))
                    .ok_or_else(|| {
                        EngineError::invalid_argument(format!(
                            "'{}' does not name a concrete type of '{}'",
                            key, target
                        ))
                    })?;
                per_type.push((
                    concrete.name.clone(),
                    self.mutation_args(&concrete.name, list, value)?,
                ));
            }
            NestedArgs::Polymorphic(per_type)
        } else {
            NestedArgs::Concrete(self.mutation_args(target, list, json)?)
        };

        Ok(NestedInput {
            target: target.clone(),
            list,
            args,
        })
    }

    /// Parse the buckets under a relation field
    pub fn mutation_args(&self, target: &str, list: bool, json: &Json) -> EngineResult<MutationArgs> {
        let object = as_object(json, &format!("{} argument", target))?;
        check_keys(
            object,
            &["create", "update", "upsert", "delete", "connect", "disconnect"],
            &format!("{} argument", target),
        )?;
        let mut args = MutationArgs::new();

        for item in one_or_many(object.get("create")) {
            args.create.push(self.record_input(target, item)?);
        }

        for item in one_or_many(object.get("update")) {
            let is_pair = item
                .as_object()
                .is_some_and(|o| o.len() == 2 && o.contains_key("where") && o.contains_key("data"));
            if list || is_pair {
                let pair = as_object(item, &format!("{} update", target))?;
                check_keys(pair, &["where", "data"], &format!("{} update", target))?;
                args.update.push(UpdateInput::WithWhere {
                    data: self.record_input(target, required(pair, "data")?)?,
                    r#where: self.where_clause(target, required(pair, "where")?)?,
                });
            } else {
                args.update
                    .push(UpdateInput::Data(self.record_input(target, item)?));
            }
        }

        for item in one_or_many(object.get("upsert")) {
            let upsert = as_object(item, &format!("{} upsert", target))?;
            check_keys(upsert, &["where", "create", "update"], &format!("{} upsert", target))?;
            args.upsert.push(UpsertInput {
                r#where: match upsert.get("where") {
                    None | Some(Json::Null) => None,
                    Some(w) => Some(self.where_clause(target, w)?),
                },
                create: self.optional_record(target, upsert.get("create"))?,
                update: self.optional_record(target, upsert.get("update"))?,
            });
        }

        for item in one_or_many(object.get("delete")) {
            match item {
                Json::Bool(true) => args.delete.push(DeleteSpec::Linked),
                Json::Bool(false) => {}
                other => args
                    .delete
                    .push(DeleteSpec::Where(self.where_clause(target, other)?)),
            }
        }

        for item in one_or_many(object.get("connect")) {
            args.connect.push(self.where_clause(target, item)?);
        }

        for item in one_or_many(object.get("disconnect")) {
            match item {
                Json::Bool(true) => args.disconnect.push(DisconnectSpec::Linked),
                Json::Bool(false) => {}
                other => args
                    .disconnect
                    .push(DisconnectSpec::Where(self.where_clause(target, other)?)),
            }
        }

        Ok(args)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn optional_record(&self, type_name: &str, json: Option<&Json>) -> EngineResult<RecordInput> {
        match json {
            None | Some(Json::Null) => Ok(RecordInput::new()),
            Some(json) => self.record_input(type_name, json),
        }
    }

    fn known_field(&self, type_name: &str, name: &str) -> EngineResult<&'a FieldDescriptor> {
        self.schema.field(type_name, name).map_err(|_| {
            EngineError::invalid_argument(format!(
                "Unknown field '{}' on type '{}'",
                name, type_name
            ))
        })
    }

    fn scalar(&self, field: &FieldDescriptor, json: &Json) -> Value {
        let value = Value::from(json.clone());
        match self.schema.scalar_kind(&field.type_name) {
            Some(kind) if !value.is_null() => kind.parse_value(value),
            _ => value,
        }
    }
}

fn as_object<'j>(json: &'j Json, what: &str) -> EngineResult<&'j Map<String, Json>> {
    json.as_object()
        .ok_or_else(|| EngineError::invalid_argument(format!("{} must be an object", what)))
}

fn required<'j>(object: &'j Map<String, Json>, key: &str) -> EngineResult<&'j Json> {
    match object.get(key) {
        None | Some(Json::Null) => Err(EngineError::invalid_argument(format!(
            "Missing required argument '{}'",
            key
        ))),
        Some(value) => Ok(value),
    }
}

fn check_keys(object: &Map<String, Json>, allowed: &[&str], what: &str) -> EngineResult<()> {
    match object.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(EngineError::invalid_argument(format!(
            "Unknown key '{}' in {}",
            key, what
        ))),
        None => Ok(()),
    }
}

/// Normalize a bucket to a list: absent → empty, scalar → one item
fn one_or_many(json: Option<&Json>) -> Vec<&Json> {
    match json {
        None | Some(Json::Null) => Vec::new(),
        Some(Json::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

// ============================================================================
// Tests
// ============================================================================
