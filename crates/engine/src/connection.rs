//! Cursor pagination
//!
//! Windows an ordered record list by record-id cursors and reports page
//! metadata. The input order is kept as is.

use serde::{Deserialize, Serialize};
use strata_core::{EngineError, EngineResult, Record, RecordId};

// ============================================================================
// Page arguments
// ============================================================================

/// Cursor arguments of a connection query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<RecordId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<RecordId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<i64>,
}

impl PageArgs {
    /// Create empty arguments
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_before(mut self, cursor: impl Into<RecordId>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn with_after(mut self, cursor: impl Into<RecordId>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn with_first(mut self, first: i64) -> Self {
        self.first = Some(first);
        self
    }

    pub fn with_last(mut self, last: i64) -> Self {
        self.last = Some(last);
        self
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A windowed result set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
    pub aggregate: Aggregate,
}

impl Connection {
    /// Records of the surviving edges
    pub fn nodes(&self) -> impl Iterator<Item = &Record> {
        self.edges.iter().map(|e| &e.node)
    }

    /// Ids of the surviving edges
    pub fn ids(&self) -> Vec<&str> {
        self.edges.iter().map(|e| e.cursor.as_str()).collect()
    }

    /// Convert into a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One record in a connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub cursor: RecordId,
    pub node: Record,
}

/// Paging metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<RecordId>,
    pub end_cursor: Option<RecordId>,
}

/// Aggregates over the candidate set before any slicing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub count: usize,
}

// ============================================================================
// Pagination
// ============================================================================

/// Window records by cursors
///
/// `after` then `before` slice the list (an unknown cursor leaves it
/// unchanged), then `first` keeps the head and `last` the tail. A negative
/// `first` or `last` is rejected.
pub fn paginate(records: Vec<Record>, args: &PageArgs) -> EngineResult<Connection> {
    let first = window_size("first", args.first)?;
    let last = window_size("last", args.last)?;

    let count = records.len();
    let all_first = records.first().map(|r| r.id.clone());
    let all_last = records.last().map(|r| r.id.clone());

    let cursored = apply_cursors(records, args.before.as_deref(), args.after.as_deref());
    let cursored_len = cursored.len();
    let cursored_first = cursored.first().map(|r| r.id.clone());
    let cursored_last = cursored.last().map(|r| r.id.clone());

    let has_previous_page = last.is_some_and(|last| cursored_len > last)
        || (args.after.is_some() && all_first != cursored_first);
    let has_next_page = first.is_some_and(|first| cursored_len > first)
        || (args.before.is_some() && all_last != cursored_last);

    let mut window = cursored;
    if let Some(first) = first {
        window.truncate(first);
    }
    if let Some(last) = last {
        let skip = window.len().saturating_sub(last);
        window.drain(..skip);
    }

    let edges: Vec<Edge> = window
        .into_iter()
        .map(|node| Edge {
            cursor: node.id.clone(),
            node,
        })
        .collect();

    Ok(Connection {
        page_info: PageInfo {
            has_next_page,
            has_previous_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        },
        aggregate: Aggregate { count },
        edges,
    })
}

fn window_size(name: &str, value: Option<i64>) -> EngineResult<Option<usize>> {
    match value {
        Some(n) if n < 0 => Err(EngineError::invalid_argument(format!(
            "{} must be greater than 0",
            name
        ))),
        Some(n) => Ok(Some(usize::try_from(n).unwrap_or(usize::MAX))),
        None => Ok(None),
    }
}

fn apply_cursors(mut records: Vec<Record>, before: Option<&str>, after: Option<&str>) -> Vec<Record> {
    if let Some(after) = after {
        if let Some(index) = records.iter().position(|r| r.id == after) {
            records.drain(..=index);
        }
    }
    if let Some(before) = before {
        if let Some(index) = records.iter().position(|r| r.id == before) {
            records.truncate(index);
        }
    }
    records
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn records(n: usize) -> Vec<Record> {
        (0..n).map(|i| Record::new(format!("r{}", i), "Item")).collect()
    }

    #[test]
    fn test_after_cursor_then_first() {
        let connection = paginate(records(10), &PageArgs::new().with_after("r2")).unwrap();
        assert_eq!(connection.ids(), vec!["r3", "r4", "r5", "r6", "r7", "r8", "r9"]);
        assert!(connection.page_info.has_previous_page);
        assert!(!connection.page_info.has_next_page);

        let connection =
            paginate(records(10), &PageArgs::new().with_after("r2").with_first(3)).unwrap();
        assert_eq!(connection.ids(), vec!["r3", "r4", "r5"]);
        assert!(connection.page_info.has_next_page);
        assert!(connection.page_info.has_previous_page);
        assert_eq!(connection.aggregate.count, 10);
        assert_eq!(connection.page_info.start_cursor.as_deref(), Some("r3"));
        assert_eq!(connection.page_info.end_cursor.as_deref(), Some("r5"));
    }

    #[test]
    fn test_before_cursor_and_last() {
        let connection =
            paginate(records(10), &PageArgs::new().with_before("r5").with_last(2)).unwrap();
        assert_eq!(connection.ids(), vec!["r3", "r4"]);
        assert!(connection.page_info.has_previous_page);
        assert!(connection.page_info.has_next_page);

        let connection = paginate(records(10), &PageArgs::new().with_before("r5")).unwrap();
        assert_eq!(connection.ids().len(), 5);
        assert!(connection.page_info.has_next_page);
        assert!(!connection.page_info.has_previous_page);
    }

    #[test]
    fn test_cursor_flags_survive_window_sizes() {
        let connection =
            paginate(records(10), &PageArgs::new().with_after("r2").with_last(10)).unwrap();
        assert_eq!(connection.ids(), vec!["r3", "r4", "r5", "r6", "r7", "r8", "r9"]);
        assert!(connection.page_info.has_previous_page);
        assert!(!connection.page_info.has_next_page);

        let connection =
            paginate(records(10), &PageArgs::new().with_before("r5").with_first(10)).unwrap();
        assert_eq!(connection.ids(), vec!["r0", "r1", "r2", "r3", "r4"]);
        assert!(connection.page_info.has_next_page);
        assert!(!connection.page_info.has_previous_page);
    }

    #[test]
    fn test_first_and_last_combined() {
        let connection =
            paginate(records(10), &PageArgs::new().with_first(5).with_last(2)).unwrap();
        assert_eq!(connection.ids(), vec!["r3", "r4"]);
        assert!(connection.page_info.has_next_page);
        assert!(connection.page_info.has_previous_page);
    }

    #[test]
    fn test_unknown_cursor_leaves_list() {
        let connection = paginate(records(4), &PageArgs::new().with_after("nope")).unwrap();
        assert_eq!(connection.ids().len(), 4);
        assert!(!connection.page_info.has_previous_page);
    }

    #[test]
    fn test_negative_window_is_invalid() {
        let err = paginate(records(3), &PageArgs::new().with_first(-1)).unwrap_err();
        assert!(err.is_invalid_argument());
        let err = paginate(records(3), &PageArgs::new().with_last(-1)).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_empty_connection() {
        let connection = paginate(Vec::new(), &PageArgs::new().with_after("r1")).unwrap();
        assert!(connection.edges.is_empty());
        assert!(!connection.page_info.has_previous_page);
        assert_eq!(connection.page_info.start_cursor, None);
        assert_eq!(connection.aggregate.count, 0);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = paginate(records(1), &PageArgs::new()).unwrap().to_json();
        assert_eq!(json["pageInfo"]["hasNextPage"], serde_json::json!(false));
        assert_eq!(json["pageInfo"]["startCursor"], serde_json::json!("r0"));
        assert_eq!(json["edges"][0]["node"]["__typename"], serde_json::json!("Item"));
        assert_eq!(json["aggregate"]["count"], serde_json::json!(1));
    }
}
