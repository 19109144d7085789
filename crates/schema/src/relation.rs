//! Relations between schema types
//!
//! A `Relation` pairs two fields that are inverses of each other. The
//! `RelationTable` is built once per schema by
//! [`compute_relations`](crate::compute_relations) and is read-only
//! afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strata_core::Cardinality;
use tracing::warn;

// ============================================================================
// RelationEndpoint
// ============================================================================

/// One side of a relation: the declaring type, the field, and its cardinality
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationEndpoint {
    /// Type declaring the field
    pub type_name: String,

    /// Field name
    pub field: String,

    /// Cardinality of the field
    pub cardinality: Cardinality,
}

impl RelationEndpoint {
    /// Create a new endpoint
    pub fn new(
        type_name: impl Into<String>,
        field: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
            cardinality,
        }
    }

    /// Check if this endpoint is the given (type, field)
    pub fn is(&self, type_name: &str, field: &str) -> bool {
        self.type_name == type_name && self.field == field
    }
}

impl std::fmt::Display for RelationEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field)?;
        if self.cardinality.is_list() {
            write!(f, "[]")?;
        }
        Ok(())
    }
}

// ============================================================================
// Relation
// ============================================================================

/// An unordered pair of endpoints; open while only one side is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// First endpoint registered
    pub first: RelationEndpoint,

    /// Second endpoint, if paired
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<RelationEndpoint>,
}

impl Relation {
    /// Create an open relation
    pub fn open(first: RelationEndpoint) -> Self {
        Self {
            first,
            second: None,
        }
    }

    /// Create a self-relation where both endpoints are the same field
    pub fn self_relation(endpoint: RelationEndpoint) -> Self {
        Self {
            second: Some(endpoint.clone()),
            first: endpoint,
        }
    }

    /// Check if only one endpoint is known
    pub fn is_open(&self) -> bool {
        self.second.is_none()
    }

    /// Check if both endpoints are the same field
    pub fn is_self(&self) -> bool {
        self.second.as_ref() == Some(&self.first)
    }

    /// Check if either endpoint equals the given one
    pub fn has_endpoint(&self, endpoint: &RelationEndpoint) -> bool {
        &self.first == endpoint || self.second.as_ref() == Some(endpoint)
    }

    /// Get the endpoint on the other side of (type, field)
    pub fn inverse_of(&self, type_name: &str, field: &str) -> Option<&RelationEndpoint> {
        let second = self.second.as_ref()?;
        if self.first.is(type_name, field) {
            Some(second)
        } else if second.is(type_name, field) {
            Some(&self.first)
        } else {
            None
        }
    }
}

// ============================================================================
// RelationWarning
// ============================================================================

/// A schema-consistency warning raised while building the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationWarning {
    /// Relation name being claimed
    pub relation: String,

    /// Endpoint that was rejected
    pub rejected: RelationEndpoint,

    /// Human-readable description
    pub message: String,
}

// ============================================================================
// RelationTable
// ============================================================================

/// Relation name → relation, iterated in name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTable {
    relations: BTreeMap<String, Relation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<RelationWarning>,
}

impl RelationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint under a relation name
    ///
    /// The first claim opens the relation and a second, different claim
    /// pairs it. Once paired, a claim matching an existing endpoint is a
    /// no-op and any other claim is rejected with a warning.
    pub fn set_relation(&mut self, name: &str, endpoint: RelationEndpoint) {
        let Some(relation) = self.relations.get_mut(name) else {
            self.relations
                .insert(name.to_string(), Relation::open(endpoint));
            return;
        };

        if relation.has_endpoint(&endpoint) {
            return;
        }
        if relation.second.is_none() {
            relation.second = Some(endpoint);
            return;
        }

        let message = format!(
            "relation '{}' could apply to multiple fields: {} conflicts with {}",
            name, endpoint, relation.first
        );
        warn!(relation = %name, field = %endpoint, "Bad schema: {}", message);
        self.warnings.push(RelationWarning {
            relation: name.to_string(),
            rejected: endpoint,
            message,
        });
    }

    /// Register a self-relation, replacing any relation of the same name
    pub fn set_self_relation(&mut self, name: &str, endpoint: RelationEndpoint) {
        self.relations
            .insert(name.to_string(), Relation::self_relation(endpoint));
    }

    /// Get a relation by name
    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Inverse of (type, field) within a named relation
    pub fn inverse(&self, name: &str, type_name: &str, field: &str) -> Option<&RelationEndpoint> {
        self.relation(name)?.inverse_of(type_name, field)
    }

    /// First inverse of (type, field) across all relations, in name order
    pub fn inverse_without_name(&self, type_name: &str, field: &str) -> Option<&RelationEndpoint> {
        self.relations
            .values()
            .find_map(|r| r.inverse_of(type_name, field))
    }

    /// Name of the relation a (type, field) belongs to, if any
    pub fn relation_name_of(&self, type_name: &str, field: &str) -> Option<&str> {
        self.relations
            .iter()
            .find(|(_, r)| {
                r.first.is(type_name, field) || r.second.as_ref().is_some_and(|s| s.is(type_name, field))
            })
            .map(|(name, _)| name.as_str())
    }

    /// Iterate over relations in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Relation)> {
        self.relations.iter()
    }

    /// Schema-consistency warnings raised while building
    pub fn warnings(&self) -> &[RelationWarning] {
        &self.warnings
    }

    /// Number of relations
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Check if the table has no relations
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(t: &str, f: &str) -> RelationEndpoint {
        RelationEndpoint::new(t, f, Cardinality::Single)
    }

    #[test]
    fn test_open_then_paired() {
        let mut table = RelationTable::new();
        table.set_relation("Authored", ep("Post", "author"));
        assert!(table.relation("Authored").is_some_and(Relation::is_open));

        table.set_relation("Authored", ep("User", "posts"));
        let relation = table.relation("Authored").unwrap();
        assert!(!relation.is_open());
        assert_eq!(
            table.inverse("Authored", "Post", "author"),
            Some(&ep("User", "posts"))
        );
        assert_eq!(
            table.inverse_without_name("User", "posts"),
            Some(&ep("Post", "author"))
        );
    }

    #[test]
    fn test_repeat_claim_is_noop() {
        let mut table = RelationTable::new();
        table.set_relation("R", ep("A", "b"));
        table.set_relation("R", ep("A", "b"));
        assert!(table.relation("R").unwrap().is_open());
        table.set_relation("R", ep("B", "a"));
        table.set_relation("R", ep("B", "a"));
        assert!(table.warnings().is_empty());
    }

    #[test]
    fn test_mismatch_keeps_first_endpoints() {
        let mut table = RelationTable::new();
        table.set_relation("R", ep("A", "b"));
        table.set_relation("R", ep("B", "a"));
        table.set_relation("R", ep("C", "a"));

        let relation = table.relation("R").unwrap();
        assert_eq!(relation.first, ep("A", "b"));
        assert_eq!(relation.second, Some(ep("B", "a")));
        assert_eq!(table.warnings().len(), 1);
        assert_eq!(table.warnings()[0].rejected, ep("C", "a"));
    }

    #[test]
    fn test_self_relation() {
        let mut table = RelationTable::new();
        table.set_self_relation("friendsOnUser", ep("User", "friends"));
        let relation = table.relation("friendsOnUser").unwrap();
        assert!(relation.is_self());
        assert_eq!(
            table.inverse_without_name("User", "friends"),
            Some(&ep("User", "friends"))
        );
    }

    #[test]
    fn test_open_relation_has_no_inverse() {
        let mut table = RelationTable::new();
        table.set_relation("R", ep("A", "b"));
        assert_eq!(table.inverse_without_name("A", "b"), None);
        assert_eq!(table.relation_name_of("A", "b"), Some("R"));
    }

    #[test]
    fn test_endpoint_display() {
        let endpoint = RelationEndpoint::new("User", "posts", Cardinality::List);
        assert_eq!(endpoint.to_string(), "User.posts[]");
    }
}
