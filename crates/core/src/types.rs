//! Core types used throughout Strata
//!
//! This module contains the value model shared by the schema, the record
//! store, and the resolution engines: scalar kinds, field cardinality,
//! dynamic values, and the flat `Record` the store persists.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ============================================================================
// Unique Identifiers
// ============================================================================

/// Type alias for record identifiers (opaque to the engine)
pub type RecordId = String;

/// Field name → value map used for record payloads and resolved arguments
pub type FieldMap = BTreeMap<String, Value>;

/// Name of the identifier field present on every record
pub const ID_FIELD: &str = "id";

/// Name of the field carrying a record's concrete type
pub const TYPENAME_FIELD: &str = "__typename";

// ============================================================================
// Cardinality
// ============================================================================

/// Whether a field holds one value or an ordered list of values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    Single,
    List,
}

impl Cardinality {
    /// Check if this is list cardinality
    pub fn is_list(&self) -> bool {
        matches!(self, Cardinality::List)
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::Single => write!(f, "single"),
            Cardinality::List => write!(f, "list"),
        }
    }
}

// ============================================================================
// ScalarKind
// ============================================================================

/// Built-in scalar types understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    Id,
    String,
    Int,
    Float,
    Boolean,
    Json,
    Date,
    Time,
    DateTime,
    /// Enum values behave as strings
    Enum,
}

impl ScalarKind {
    /// Resolve a built-in scalar from its type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "ID" => Some(ScalarKind::Id),
            "String" => Some(ScalarKind::String),
            "Int" => Some(ScalarKind::Int),
            "Float" => Some(ScalarKind::Float),
            "Boolean" => Some(ScalarKind::Boolean),
            "JSON" => Some(ScalarKind::Json),
            "Date" => Some(ScalarKind::Date),
            "Time" => Some(ScalarKind::Time),
            "DateTime" => Some(ScalarKind::DateTime),
            _ => None,
        }
    }

    /// Get the schema name of this scalar
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarKind::Id => "ID",
            ScalarKind::String => "String",
            ScalarKind::Int => "Int",
            ScalarKind::Float => "Float",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::Json => "JSON",
            ScalarKind::Date => "Date",
            ScalarKind::Time => "Time",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::Enum => "Enum",
        }
    }

    /// Parse an input value into this scalar's native representation
    ///
    /// Values that cannot be converted are returned unchanged; the store
    /// decides whether they are acceptable.
    pub fn parse_value(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::List(items)) => {
                Value::List(items.into_iter().map(|v| self.parse_value(v)).collect())
            }
            (ScalarKind::Date | ScalarKind::DateTime, Value::String(s)) => {
                match parse_datetime(&s) {
                    Some(dt) => Value::DateTime(dt),
                    None => Value::String(s),
                }
            }
            (ScalarKind::Date | ScalarKind::DateTime, Value::Int(millis)) => {
                match Utc.timestamp_millis_opt(millis).single() {
                    Some(dt) => Value::DateTime(dt),
                    None => Value::Int(millis),
                }
            }
            (ScalarKind::Int, Value::Float(f)) if f.fract() == 0.0 => Value::Int(f as i64),
            (ScalarKind::Int, Value::String(s)) => match s.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::String(s),
            },
            (ScalarKind::Float, Value::Int(i)) => Value::Float(i as f64),
            (ScalarKind::Float, Value::String(s)) => match s.parse::<f64>() {
                Ok(f) => Value::Float(f),
                Err(_) => Value::String(s),
            },
            (ScalarKind::Id, Value::Int(i)) => Value::String(i.to_string()),
            (_, other) => other,
        }
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ============================================================================
// Value
// ============================================================================

/// A dynamically typed field value
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness as used by uniqueness checks: null, false, zero and the
    /// empty string do not count as a present value
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Borrow the value as a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the value as a list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Check whether a list value contains an element
    pub fn contains(&self, needle: &Value) -> bool {
        self.as_list().is_some_and(|items| items.contains(needle))
    }

    /// Extract record ids from a link value (a single id or a list of ids)
    pub fn ids(&self) -> Vec<RecordId> {
        match self {
            Value::String(s) => vec![s.clone()],
            Value::List(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Build a link value from a list of ids
    pub fn id_list(ids: impl IntoIterator<Item = RecordId>) -> Self {
        Value::List(ids.into_iter().map(Value::String).collect())
    }

    /// Total ordering used for sorting: nulls first, then by variant, then by value
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.len().cmp(&b.len()),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::DateTime(_) => 4,
            Value::List(_) => 5,
            Value::Object(_) => 6,
        }
    }

    /// Convert into a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Serialize a field map (or anything serializable) for error messages
pub fn describe<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unprintable>".to_string())
}

// ============================================================================
// Record
// ============================================================================

/// A flat record as persisted by the record store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Opaque identifier
    pub id: RecordId,

    /// Concrete type of the record
    #[serde(rename = "__typename")]
    pub type_name: String,

    /// Scalar and relation fields
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Record {
    /// Create an empty record
    pub fn new(id: impl Into<RecordId>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            fields: FieldMap::new(),
        }
    }

    /// Set a field using builder pattern
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a field value; `id` resolves to the record id
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == ID_FIELD {
            return Some(Value::String(self.id.clone()));
        }
        self.fields.get(field).cloned()
    }

    /// Borrow a stored field value
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Ids referenced by a relation field
    pub fn link_ids(&self, field: &str) -> Vec<RecordId> {
        self.fields.get(field).map(Value::ids).unwrap_or_default()
    }

    /// Produce a new view of this record with `patch` applied on top
    pub fn patched(&self, patch: &FieldMap) -> Record {
        let mut next = self.clone();
        for (key, value) in patch {
            if key != ID_FIELD {
                next.fields.insert(key.clone(), value.clone());
            }
        }
        next
    }

    /// Convert into a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// Tests
// ============================================================================
