//! Relation inference
//!
//! Walks every (type, field) pair of a schema and works out which fields are
//! inverses of each other:
//!
//! - a field pointing at its own type is a self-relation named
//!   `<field>On<Type>`
//! - a field with an explicit relation name joins that relation
//! - otherwise, when the declaring type has exactly one field pointing at the
//!   target and the target has exactly one field pointing back, the two are
//!   paired under `<A>_<B>` (sorted type names)
//!
//! Anything else stays unpaired.

use crate::Schema;
use crate::naming::{implicit_relation_name, self_relation_name};
use crate::relation::{RelationEndpoint, RelationTable};
use crate::type_descriptor::TypeDescriptor;
use std::collections::HashMap;
use tracing::debug;

/// Compute the relation table for a schema
///
/// Types are visited in name order and fields in declaration order, so the
/// result is deterministic for a given schema.
pub fn compute_relations(schema: &Schema) -> RelationTable {
    let mut counts = FieldCountCache::default();
    let mut table = RelationTable::new();

    for ty in schema.types().filter(|t| t.kind.is_composite()) {
        for field in &ty.fields {
            let endpoint = RelationEndpoint::new(&ty.name, &field.name, field.cardinality);

            if field.type_name == ty.name {
                table.set_self_relation(&self_relation_name(&field.name, &ty.name), endpoint);
                continue;
            }

            if let Some(name) = &field.relation {
                table.set_relation(name, endpoint);
                continue;
            }

            let Some(target) = schema
                .get_type(&field.type_name)
                .filter(|t| t.kind.is_composite())
            else {
                continue;
            };

            let forward = counts.get(ty, &target.name);
            let reverse = counts.get(target, &ty.name);
            if forward == 1 && reverse == 1 {
                table.set_relation(&implicit_relation_name(&ty.name, &target.name), endpoint);
            }
        }
    }

    debug!(
        relations = table.len(),
        warnings = table.warnings().len(),
        "Computed relations"
    );
    table
}

/// Counts of fields on a type pointing at another type, scoped to one call
#[derive(Default)]
struct FieldCountCache {
    counts: HashMap<(String, String), usize>,
}

impl FieldCountCache {
    fn get(&mut self, ty: &TypeDescriptor, target: &str) -> usize {
        *self
            .counts
            .entry((ty.name.clone(), target.to_string()))
            .or_insert_with(|| ty.count_fields_targeting(target))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldDescriptor;
    use pretty_assertions::assert_eq;
    use strata_core::Cardinality;

    fn blog() -> Schema {
        Schema::new()
            .with_type(
                TypeDescriptor::object("User")
                    .with_field(FieldDescriptor::new("name", "String"))
                    .with_field(FieldDescriptor::list("posts", "Post"))
                    .with_field(FieldDescriptor::list("friends", "User")),
            )
            .with_type(
                TypeDescriptor::object("Post")
                    .with_field(FieldDescriptor::new("title", "String"))
                    .with_field(FieldDescriptor::new("author", "User")),
            )
    }

    #[test]
    fn test_implicit_pairing() {
        let table = compute_relations(&blog());
        let relation = table.relation("Post_User").unwrap();
        assert!(!relation.is_open());
        assert_eq!(
            table.inverse_without_name("User", "posts"),
            Some(&RelationEndpoint::new("Post", "author", Cardinality::Single))
        );
        assert_eq!(
            table.inverse_without_name("Post", "author"),
            Some(&RelationEndpoint::new("User", "posts", Cardinality::List))
        );
    }

    #[test]
    fn test_self_relation() {
        let table = compute_relations(&blog());
        let relation = table.relation("friendsOnUser").unwrap();
        assert!(relation.is_self());
    }

    #[test]
    fn test_deterministic() {
        let schema = blog();
        assert_eq!(compute_relations(&schema), compute_relations(&schema));
    }

    #[test]
    fn test_ambiguous_fields_stay_unpaired() {
        let schema = Schema::new()
            .with_type(
                TypeDescriptor::object("User")
                    .with_field(FieldDescriptor::list("posts", "Post"))
                    .with_field(FieldDescriptor::list("drafts", "Post")),
            )
            .with_type(TypeDescriptor::object("Post").with_field(FieldDescriptor::new("author", "User")));
        let table = compute_relations(&schema);
        assert!(table.is_empty());
        assert_eq!(table.inverse_without_name("Post", "author"), None);
    }

    #[test]
    fn test_explicit_names_resolve_ambiguity() {
        let schema = Schema::new()
            .with_type(
                TypeDescriptor::object("User")
                    .with_field(FieldDescriptor::list("posts", "Post").with_relation("Authored"))
                    .with_field(FieldDescriptor::list("liked", "Post").with_relation("Likes")),
            )
            .with_type(
                TypeDescriptor::object("Post")
                    .with_field(FieldDescriptor::new("author", "User").with_relation("Authored"))
                    .with_field(FieldDescriptor::list("likedBy", "User").with_relation("Likes")),
            );
        let table = compute_relations(&schema);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.inverse("Likes", "Post", "likedBy").map(|e| e.field.as_str()),
            Some("liked")
        );
        assert_eq!(
            table.inverse("Authored", "User", "posts").map(|e| e.field.as_str()),
            Some("author")
        );
    }

    #[test]
    fn test_disagreeing_explicit_endpoint_only_warns() {
        let schema = Schema::new()
            .with_type(
                TypeDescriptor::object("A")
                    .with_field(FieldDescriptor::new("b", "B").with_relation("Link")),
            )
            .with_type(
                TypeDescriptor::object("B")
                    .with_field(FieldDescriptor::new("a", "A").with_relation("Link")),
            )
            .with_type(
                TypeDescriptor::object("C")
                    .with_field(FieldDescriptor::new("a", "A").with_relation("Link")),
            );
        let table = compute_relations(&schema);
        let relation = table.relation("Link").unwrap();
        assert_eq!(relation.first.type_name, "A");
        assert_eq!(relation.second.as_ref().map(|e| e.type_name.as_str()), Some("B"));
        assert_eq!(table.warnings().len(), 1);
    }

    #[test]
    fn test_scalar_fields_are_ignored() {
        let schema = Schema::new()
            .with_type(TypeDescriptor::object("Tag").with_field(FieldDescriptor::new("label", "String")));
        assert!(compute_relations(&schema).is_empty());
    }
}
