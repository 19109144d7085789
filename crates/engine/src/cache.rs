//! Per-call resolution cache
//!
//! Records fetched while resolving one query are kept here so relation
//! fields of the returned records can reuse them. Entries filtered by a
//! nested filter pass are stored per parent field.

use std::collections::HashMap;
use strata_core::{Record, RecordId};
use tokio::sync::Mutex;

/// Cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A record by id
    Record(RecordId),
    /// The records of one parent's relation field
    Field { root: RecordId, field: String },
}

impl CacheKey {
    pub fn field(root: impl Into<RecordId>, field: impl Into<String>) -> Self {
        CacheKey::Field {
            root: root.into(),
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone)]
enum Cached {
    Record(Record),
    Records(Vec<Record>),
}

/// Records seen during one resolution call
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: Mutex<HashMap<CacheKey, Cached>>,
}

impl ResolutionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember records by id
    pub async fn insert_records(&self, records: impl IntoIterator<Item = Record>) {
        let mut entries = self.entries.lock().await;
        for record in records {
            entries.insert(CacheKey::Record(record.id.clone()), Cached::Record(record));
        }
    }

    /// Cached record by id
    pub async fn record(&self, id: &str) -> Option<Record> {
        match self.entries.lock().await.get(&CacheKey::Record(id.to_string())) {
            Some(Cached::Record(record)) => Some(record.clone()),
            _ => None,
        }
    }

    /// Remember the filtered records of a parent's relation field
    pub async fn set_field(&self, root: &str, field: &str, records: Vec<Record>) {
        self.entries
            .lock()
            .await
            .insert(CacheKey::field(root, field), Cached::Records(records));
    }

    /// Filtered records of a parent's relation field
    pub async fn field(&self, root: &str, field: &str) -> Option<Vec<Record>> {
        match self.entries.lock().await.get(&CacheKey::field(root, field)) {
            Some(Cached::Records(records)) => Some(records.clone()),
            _ => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_fields_are_kept_apart() {
        let cache = ResolutionCache::new();
        assert!(cache.is_empty().await);

        cache
            .insert_records(vec![Record::new("p1", "Post"), Record::new("p2", "Post")])
            .await;
        cache
            .set_field("u1", "posts", vec![Record::new("p2", "Post")])
            .await;

        assert_eq!(cache.len().await, 3);
        assert_eq!(cache.record("p1").await.map(|r| r.id), Some("p1".to_string()));
        assert!(cache.record("u1").await.is_none());
        assert_eq!(cache.field("u1", "posts").await.map(|r| r.len()), Some(1));
        assert!(cache.field("u1", "comments").await.is_none());
    }
}
