//! Store-level query options
//!
//! `QueryOptions` is what the filter translator produces and what a record
//! store consumes: a predicate tree, sort keys, and an offset/limit window.
//! Evaluation lives here so any store can apply options to records it holds
//! in memory.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use strata_core::{FieldMap, ID_FIELD, Record, RecordId, TYPENAME_FIELD, Value};

// ============================================================================
// Predicate
// ============================================================================

/// A boolean condition over record fields
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every field equals the given value; list values match by inclusion
    Match(FieldMap),
    /// Every field lies in an inclusive `(min, max)` range; `Null` is an open end
    Range(BTreeMap<String, (Value, Value)>),
    /// Every field is present (`true`) or absent (`false`)
    Exists(BTreeMap<String, bool>),
    /// All nested predicates hold
    And(Vec<Predicate>),
    /// At least one nested predicate holds
    Or(Vec<Predicate>),
    /// The nested predicate does not hold
    Not(Box<Predicate>),
}

impl Predicate {
    /// Match a single field against a value
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = FieldMap::new();
        map.insert(field.into(), value.into());
        Predicate::Match(map)
    }

    /// Check whether a record satisfies the predicate
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Match(fields) => fields
                .iter()
                .all(|(name, expected)| match_value(&field_value(record, name), expected)),
            Predicate::Range(ranges) => ranges
                .iter()
                .all(|(name, (min, max))| in_range(&field_value(record, name), min, max)),
            Predicate::Exists(fields) => fields
                .iter()
                .all(|(name, wanted)| is_present(&field_value(record, name)) == *wanted),
            Predicate::And(all) => all.iter().all(|p| p.matches(record)),
            Predicate::Or(any) => any.iter().any(|p| p.matches(record)),
            Predicate::Not(inner) => !inner.matches(record),
        }
    }

    /// Remove an `id` match from the top level and return the ids it named
    ///
    /// Looks at a bare `Match` and at the direct children of an `And`.
    pub fn take_id_match(&mut self) -> Option<Vec<RecordId>> {
        match self {
            Predicate::Match(fields) => fields.remove(ID_FIELD).map(|v| v.ids()),
            Predicate::And(all) => all.iter_mut().find_map(Predicate::take_id_match),
            _ => None,
        }
    }
}

/// Field value of a record, including the `id` and `__typename` pseudo-fields
fn field_value(record: &Record, name: &str) -> Value {
    if name == TYPENAME_FIELD {
        return Value::String(record.type_name.clone());
    }
    record.get(name).unwrap_or(Value::Null)
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            a.sort_cmp(b) == Ordering::Equal
        }
        _ => a == b,
    }
}

fn match_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::List(have), Value::List(want)) => {
            have.iter().any(|h| want.iter().any(|w| scalar_eq(h, w)))
        }
        (Value::List(have), want) => have.iter().any(|h| scalar_eq(h, want)),
        (have, Value::List(want)) => want.iter().any(|w| scalar_eq(have, w)),
        (have, want) => scalar_eq(have, want),
    }
}

fn comparable(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_))
            | (Value::String(_), Value::String(_))
            | (Value::DateTime(_), Value::DateTime(_))
            | (Value::Bool(_), Value::Bool(_))
    )
}

fn in_range(actual: &Value, min: &Value, max: &Value) -> bool {
    // Lists are ranged by length
    let actual = match actual {
        Value::List(items) => Value::Int(items.len() as i64),
        Value::Null => return false,
        other => other.clone(),
    };
    let above_min = min.is_null() || (comparable(&actual, min) && actual.sort_cmp(min) != Ordering::Less);
    let below_max =
        max.is_null() || (comparable(&actual, max) && actual.sort_cmp(max) != Ordering::Greater);
    above_min && below_max
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::List(items) => !items.is_empty(),
        _ => true,
    }
}

// ============================================================================
// SortKey
// ============================================================================

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: true,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ascending: false,
        }
    }
}

// ============================================================================
// QueryOptions
// ============================================================================

/// Options for a store query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Records must satisfy this predicate
    pub predicate: Option<Predicate>,

    /// Sort keys in priority order
    pub sort: Vec<SortKey>,

    /// Number of matching records to skip
    pub offset: usize,

    /// Maximum number of records to return
    pub limit: Option<usize>,
}

impl QueryOptions {
    /// Create empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the predicate
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Add a sort key
    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Set the offset
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Set the limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if the options would leave any record list unchanged
    pub fn is_empty(&self) -> bool {
        self.predicate.is_none() && self.sort.is_empty() && self.offset == 0 && self.limit.is_none()
    }

    /// Filter, sort, and window a list of records
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut records: Vec<Record> = match &self.predicate {
            Some(predicate) => records.into_iter().filter(|r| predicate.matches(r)).collect(),
            None => records,
        };

        if !self.sort.is_empty() {
            records.sort_by(|a, b| self.compare(a, b));
        }

        let window = records.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => window.take(limit).collect(),
            None => window.collect(),
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.sort {
            let ordering = field_value(a, &key.field).sort_cmp(&field_value(b, &key.field));
            let ordering = if key.ascending {
                ordering
            } else {
                ordering.reverse()
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Vec<Record> {
        vec![
            Record::new("1", "User")
                .with_field("name", "Ann")
                .with_field("age", 31i64)
                .with_field("tags", Value::List(vec![Value::from("a"), Value::from("b")])),
            Record::new("2", "User").with_field("name", "Bob").with_field("age", 25i64),
            Record::new("3", "User").with_field("name", "Cid").with_field("age", 40i64),
            Record::new("4", "User").with_field("name", "Ann"),
        ]
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_match_equality_and_inclusion() {
        let options = QueryOptions::new().with_predicate(Predicate::field_eq("name", "Ann"));
        assert_eq!(ids(&options.apply(people())), vec!["1", "4"]);

        let options = QueryOptions::new().with_predicate(Predicate::field_eq("tags", "b"));
        assert_eq!(ids(&options.apply(people())), vec!["1"]);

        let options = QueryOptions::new().with_predicate(Predicate::field_eq(
            "name",
            Value::List(vec![Value::from("Bob"), Value::from("Cid")]),
        ));
        assert_eq!(ids(&options.apply(people())), vec!["2", "3"]);
    }

    #[test]
    fn test_range_with_open_ends() {
        let mut ranges = BTreeMap::new();
        ranges.insert("age".to_string(), (Value::Int(30), Value::Null));
        let options = QueryOptions::new().with_predicate(Predicate::Range(ranges));
        assert_eq!(ids(&options.apply(people())), vec!["1", "3"]);

        let mut ranges = BTreeMap::new();
        ranges.insert("age".to_string(), (Value::Float(25.0), Value::Int(31)));
        let options = QueryOptions::new().with_predicate(Predicate::Range(ranges));
        assert_eq!(ids(&options.apply(people())), vec!["1", "2"]);
    }

    #[test]
    fn test_exists_and_logic() {
        let mut exists = BTreeMap::new();
        exists.insert("age".to_string(), false);
        let absent = Predicate::Exists(exists);
        let options = QueryOptions::new().with_predicate(absent.clone());
        assert_eq!(ids(&options.apply(people())), vec!["4"]);

        let options = QueryOptions::new().with_predicate(Predicate::Or(vec![
            absent.clone(),
            Predicate::field_eq("name", "Bob"),
        ]));
        assert_eq!(ids(&options.apply(people())), vec!["2", "4"]);

        let options = QueryOptions::new().with_predicate(Predicate::Not(Box::new(absent)));
        assert_eq!(ids(&options.apply(people())), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_multi_key_sort_offset_limit() {
        let options = QueryOptions::new()
            .with_sort(SortKey::ascending("name"))
            .with_sort(SortKey::descending("age"))
            .with_offset(1)
            .with_limit(2);
        // Ann(31), Ann(null), Bob, Cid → skip one, take two
        assert_eq!(ids(&options.apply(people())), vec!["4", "2"]);
    }

    #[test]
    fn test_take_id_match() {
        let mut predicate = Predicate::And(vec![
            Predicate::field_eq("name", "Ann"),
            Predicate::field_eq(ID_FIELD, Value::List(vec![Value::from("1"), Value::from("4")])),
        ]);
        assert_eq!(
            predicate.take_id_match(),
            Some(vec!["1".to_string(), "4".to_string()])
        );
        assert_eq!(predicate.take_id_match(), None);
    }

    #[test]
    fn test_typename_pseudo_field() {
        let mut records = people();
        records.push(Record::new("5", "Admin"));
        let options = QueryOptions::new().with_predicate(Predicate::field_eq(TYPENAME_FIELD, "Admin"));
        assert_eq!(ids(&options.apply(records)), vec!["5"]);
        assert!(QueryOptions::new().is_empty());
    }
}
