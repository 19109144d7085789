//! Nested mutation resolution
//!
//! A mutation node holds typed argument buckets for one record type. Each
//! node runs its phases in a fixed order:
//!
//! 1. uniqueness gate over the create and update payloads
//! 2. where resolution (`{data, where}` pairs become sub-mutations)
//! 3. upserts
//! 4. nested relation arguments, resolved depth first and spliced back into
//!    the payloads as link ids
//! 5. creates
//! 6. updates (only changed fields are written)
//! 7. connect
//! 8. disconnect
//! 9. delete
//!
//! Siblings within a phase run concurrently; the first failure is reported
//! once all of them have settled. Writes already issued stay applied.

use crate::args::{
    DeleteSpec, DisconnectSpec, InputValue, MutationArgs, MutationInput, MutationKind, NestedArgs,
    RecordInput, Selector, UpdateInput, UpsertInput,
};
use crate::store::{RecordStore, RecordUpdate};
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use strata_core::{
    EngineError, EngineResult, FieldMap, ID_FIELD, Record, RecordId, Value, describe,
};
use tracing::{debug, info};

// ============================================================================
// Results
// ============================================================================

/// Ids a nested node hands back to its parent
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Link {
    #[default]
    None,
    One(RecordId),
    Many(Vec<RecordId>),
}

impl Link {
    /// Link ids held by a field value
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(id)) => Link::One(id.clone()),
            Some(list @ Value::List(_)) => Link::Many(list.ids()),
            _ => Link::None,
        }
    }

    fn into_value(self) -> Option<Value> {
        match self {
            Link::None => None,
            Link::One(id) => Some(Value::String(id)),
            Link::Many(ids) => Some(Value::id_list(ids)),
        }
    }
}

/// Outcome of one write inside a node
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    /// Position of the parent payload this result belongs to
    pub index: Option<usize>,

    /// Parent field the result links into
    pub key: Option<String>,

    pub link: Link,

    pub data: Option<Record>,
}

/// Result of a root mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationPayload {
    pub data: Option<Record>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_mutation_id: Option<String>,
}

impl MutationPayload {
    /// Convert into a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Where a node sits in its parent's payloads
#[derive(Debug, Clone, Default)]
struct Slot {
    index: Option<usize>,
    key: Option<String>,
}

impl Slot {
    fn nested(index: usize, key: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            key: Some(key.into()),
        }
    }

    fn is_root(&self) -> bool {
        self.key.is_none()
    }

    fn resolved(&self, link: Link, data: Option<Record>) -> Resolved {
        Resolved {
            index: self.index,
            key: self.key.clone(),
            link,
            data,
        }
    }
}

/// Everything a node produced, plus its final view of the current record
#[derive(Debug, Default)]
struct Resolution {
    results: Vec<Resolved>,
    current: Option<Record>,
}

// ============================================================================
// MutationEngine
// ============================================================================

/// Resolves nested mutation trees against a record store
pub struct MutationEngine<'a> {
    store: &'a dyn RecordStore,
}

impl<'a> MutationEngine<'a> {
    /// Create an engine over a store
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self { store }
    }

    /// Run a root mutation
    ///
    /// The payload holds the first written record, or the last known current
    /// record when nothing was written.
    pub async fn mutate(&self, input: MutationInput) -> EngineResult<MutationPayload> {
        info!(kind = %input.kind, type_name = %input.type_name, "Resolving mutation");
        let resolution = self
            .resolve(
                input.kind,
                None,
                input.args,
                input.type_name,
                Slot::default(),
            )
            .await?;

        let data = resolution
            .results
            .into_iter()
            .next()
            .and_then(|r| r.data)
            .or(resolution.current);

        Ok(MutationPayload {
            data,
            client_mutation_id: input.client_mutation_id,
        })
    }

    fn resolve(
        &self,
        kind: MutationKind,
        current: Option<Record>,
        args: MutationArgs,
        type_name: String,
        slot: Slot,
    ) -> BoxFuture<'_, EngineResult<Resolution>> {
        async move {
            let mut current = current;
            let MutationArgs {
                create,
                update,
                upsert,
                delete,
                connect,
                disconnect,
                selector,
            } = args;
            debug!(
                kind = %kind,
                type_name = %type_name,
                key = ?slot.key,
                index = ?slot.index,
                "Resolving mutation node"
            );

            self.check_unique(&type_name, &create, &update).await?;

            let mut results = Vec::new();
            let mut updates = Vec::new();

            // Where resolution
            if !update.is_empty() {
                let mut pairs = Vec::new();
                for entry in update {
                    match entry {
                        UpdateInput::Data(data) => updates.push(data),
                        UpdateInput::WithWhere { data, r#where } => pairs.push((data, r#where)),
                    }
                }

                match &selector {
                    Some(Selector::Unique(r#where)) => {
                        current = Some(self.lookup(&type_name, r#where).await?);
                    }
                    Some(Selector::Current) => {}
                    None if !pairs.is_empty() => {
                        let subs = pairs.into_iter().map(|(data, r#where)| {
                            let args = MutationArgs::new()
                                .with_update(UpdateInput::Data(data))
                                .with_selector(Selector::Unique(r#where));
                            self.resolve(kind, current.clone(), args, type_name.clone(), slot.clone())
                        });
                        let settled = join_all(subs).await;
                        for sub in settled {
                            let sub = sub?;
                            if slot.is_root() {
                                results.extend(sub.results.into_iter().next());
                            }
                        }
                    }
                    None => {
                        // A singular relation: the parent already names the record
                        if let Some(key) = &slot.key {
                            let linked = current
                                .as_ref()
                                .and_then(|parent| parent.field(key))
                                .and_then(Value::as_str)
                                .map(str::to_string);
                            let found = match linked {
                                Some(id) => {
                                    self.store
                                        .get_value_by_unique(&type_name, &id_lookup(id))
                                        .await?
                                }
                                None => None,
                            };
                            match found {
                                Some(record) => current = Some(record),
                                None => updates.clear(),
                            }
                        }
                    }
                }
            }

            // Upserts
            if !upsert.is_empty() {
                let subs = upsert
                    .into_iter()
                    .map(|entry| self.upsert(kind, current.clone(), entry, &type_name, &slot));
                for sub in join_all(subs).await {
                    results.extend(sub?);
                }
            }

            // Nested arguments
            let nested_updates = updates.iter().any(RecordInput::has_nested);
            let (created, updated) = futures::join!(
                self.resolve_inputs(MutationKind::Create, create, current.clone()),
                self.resolve_inputs(MutationKind::Update, updates, current.clone()),
            );
            let (create_maps, mut update_maps) = (created?, updated?);

            // Nested disconnects and deletes write the current record directly
            if let (true, Some(stale)) = (nested_updates, current.as_ref()) {
                let fresh = self
                    .store
                    .get_value_by_unique(&stale.type_name, &id_lookup(stale.id.clone()))
                    .await?;
                if let Some(fresh) = fresh {
                    for fields in &mut update_maps {
                        drop_removed_links(fields, stale, &fresh);
                    }
                    current = Some(fresh);
                }
            }

            // Creates
            let creates = create_maps
                .into_iter()
                .map(without_nulls)
                .filter(|fields| !fields.is_empty())
                .map(|fields| self.store.create(&type_name, vec![fields]));
            for created in join_all(creates).await {
                for record in created? {
                    results.push(slot.resolved(Link::One(record.id.clone()), Some(record)));
                }
            }

            // Updates
            for fields in update_maps {
                let fields = without_nulls(fields);
                let Some(record) = current.as_ref() else {
                    if fields.is_empty() {
                        continue;
                    }
                    return Err(EngineError::not_found(&type_name, describe(&fields)));
                };

                let patch = changed_fields(record, &fields);
                if patch.is_empty() {
                    continue;
                }

                let written = self
                    .store
                    .update(
                        &record.type_name,
                        vec![RecordUpdate::from_patch(record.id.clone(), patch)],
                    )
                    .await?;
                if let Some(record) = written.into_iter().next() {
                    results.push(slot.resolved(Link::One(record.id.clone()), Some(record.clone())));
                    current = Some(record);
                }
            }

            // Connect
            if !connect.is_empty() {
                let lookups = connect
                    .iter()
                    .map(|unique| self.store.get_value_by_unique(&type_name, unique));
                let settled = join_all(lookups).await;
                for (unique, found) in connect.iter().zip(settled) {
                    match found? {
                        Some(record) => {
                            results.push(slot.resolved(Link::One(record.id.clone()), Some(record)))
                        }
                        None => {
                            return Err(EngineError::ConnectTargetMissing {
                                type_name: type_name.clone(),
                                args: describe(unique),
                            });
                        }
                    }
                }
            }

            // Disconnect
            if !disconnect.is_empty() {
                let mut lookups = Vec::new();
                for spec in disconnect {
                    match spec {
                        DisconnectSpec::Linked => {
                            let (parent, key) = parent_field(&current, &slot, "disconnect")?;
                            let written = self
                                .store
                                .update(
                                    &parent.type_name,
                                    vec![RecordUpdate::new(parent.id.clone()).with_replace(key, Value::Null)],
                                )
                                .await?;
                            results.push(slot.resolved(Link::None, written.into_iter().next()));
                        }
                        DisconnectSpec::Where(unique) => lookups.push(unique),
                    }
                }

                if !lookups.is_empty() {
                    let settled = join_all(
                        lookups
                            .iter()
                            .map(|unique| self.store.get_value_by_unique(&type_name, unique)),
                    )
                    .await;
                    let mut ids = Vec::new();
                    for found in settled {
                        // Misses are dropped
                        if let Some(record) = found? {
                            ids.push(record.id);
                        }
                    }

                    if !ids.is_empty() {
                        let (parent, key) = parent_field(&current, &slot, "disconnect")?;
                        let written = self
                            .store
                            .update(
                                &parent.type_name,
                                vec![RecordUpdate::new(parent.id.clone()).with_pull(key, Value::id_list(ids))],
                            )
                            .await?;
                        let record = written.into_iter().next();
                        let link = Link::from_value(record.as_ref().and_then(|r| r.field(key)));
                        results.push(slot.resolved(link, record));
                    }
                }
            }

            // Delete
            if !delete.is_empty() {
                let mut lookups = Vec::new();
                for spec in delete {
                    match spec {
                        DeleteSpec::Linked => {
                            let (parent, key) = parent_field(&current, &slot, "delete")?;
                            let link = self.link_type(parent, key)?;
                            let ids = parent.link_ids(key);
                            if !ids.is_empty() {
                                self.store.delete(&link, &ids).await?;
                            }
                            results.push(slot.resolved(Link::None, None));
                        }
                        DeleteSpec::Where(unique) if current.is_none() => {
                            let record = self.lookup(&type_name, &unique).await?;
                            self.store
                                .delete(&record.type_name, &[record.id.clone()])
                                .await?;
                            results.push(slot.resolved(Link::None, Some(record)));
                        }
                        DeleteSpec::Where(unique) => lookups.push(unique),
                    }
                }

                if !lookups.is_empty() {
                    let (parent, key) = parent_field(&current, &slot, "delete")?;
                    let link = self.link_type(parent, key)?;
                    let settled = join_all(
                        lookups
                            .iter()
                            .map(|unique| self.store.get_value_by_unique(&link, unique)),
                    )
                    .await;
                    let mut ids = Vec::new();
                    for (unique, found) in lookups.iter().zip(settled) {
                        match found? {
                            Some(record) => ids.push(record.id),
                            None => return Err(EngineError::not_found(&link, describe(unique))),
                        }
                    }
                    self.store.delete(&link, &ids).await?;
                    results.push(slot.resolved(Link::None, None));
                }
            }

            Ok(Resolution { results, current })
        }
        .boxed()
    }

    /// Fail the node if any payload duplicates a stored unique value
    async fn check_unique(
        &self,
        type_name: &str,
        create: &[RecordInput],
        update: &[UpdateInput],
    ) -> EngineResult<()> {
        let creates: Vec<FieldMap> = create.iter().map(RecordInput::scalar_projection).collect();
        let updates: Vec<FieldMap> = update
            .iter()
            .filter_map(|entry| match entry {
                UpdateInput::Data(data) => Some(data.scalar_projection()),
                UpdateInput::WithWhere { .. } => None,
            })
            .collect();

        let (can_create, can_update) = futures::join!(
            self.store.can_add(type_name, &creates),
            self.store.can_add(type_name, &updates),
        );
        if can_create? && can_update? {
            return Ok(());
        }
        Err(EngineError::uniqueness_conflict(
            type_name,
            describe(&serde_json::json!({ "create": creates, "update": updates })),
        ))
    }

    /// Resolve one upsert entry into a create or an update sub-mutation
    async fn upsert(
        &self,
        kind: MutationKind,
        current: Option<Record>,
        entry: UpsertInput,
        type_name: &str,
        slot: &Slot,
    ) -> EngineResult<Option<Resolved>> {
        let existing = match (&entry.r#where, &slot.key) {
            (Some(unique), _) => self.store.get_value_by_unique(type_name, unique).await?,
            (None, Some(key)) => {
                let linked = current
                    .as_ref()
                    .and_then(|parent| parent.field(key))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                match linked {
                    Some(id) => {
                        self.store
                            .get_value_by_unique(type_name, &id_lookup(id))
                            .await?
                    }
                    None => None,
                }
            }
            (None, None) => current,
        };

        let (args, target) = match existing {
            Some(record) => (
                MutationArgs::new()
                    .with_update(UpdateInput::Data(entry.update))
                    .with_selector(Selector::Current),
                Some(record),
            ),
            None => (MutationArgs::new().with_create(entry.create), None),
        };

        let sub = self
            .resolve(kind, target, args, type_name.to_string(), slot.clone())
            .await?;
        Ok(sub.results.into_iter().next().or_else(|| {
            // An update that changed nothing still reports the record
            sub.current.map(|record| slot.resolved(Link::One(record.id.clone()), Some(record)))
        }))
    }

    /// Resolve the nested relation arguments of payloads
    ///
    /// Returns flat field maps where every nested argument has been replaced
    /// by the ids its sub-mutations produced.
    async fn resolve_inputs(
        &self,
        kind: MutationKind,
        inputs: Vec<RecordInput>,
        current: Option<Record>,
    ) -> EngineResult<Vec<FieldMap>> {
        let mut maps = Vec::with_capacity(inputs.len());
        let mut subs = Vec::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let mut fields = FieldMap::new();
            for (name, value) in input.fields {
                let nested = match value {
                    InputValue::Value(value) => {
                        fields.insert(name, value);
                        continue;
                    }
                    InputValue::Nested(nested) => nested,
                };
                if nested.list {
                    fields.insert(name.clone(), Value::List(Vec::new()));
                }

                let slot = Slot::nested(index, name);
                match nested.args {
                    NestedArgs::Concrete(args) => {
                        subs.push(self.resolve(kind, current.clone(), args, nested.target, slot));
                    }
                    NestedArgs::Polymorphic(per_type) => {
                        for (concrete, args) in per_type {
                            subs.push(self.resolve(kind, current.clone(), args, concrete, slot.clone()));
                        }
                    }
                }
            }
            maps.push(fields);
        }

        if subs.is_empty() {
            return Ok(maps);
        }
        let resolutions = join_all(subs)
            .await
            .into_iter()
            .collect::<EngineResult<Vec<_>>>()?;
        for resolved in resolutions.into_iter().flat_map(|r| r.results) {
            splice(&mut maps, resolved);
        }
        Ok(maps)
    }

    async fn lookup(&self, type_name: &str, unique: &FieldMap) -> EngineResult<Record> {
        self.store
            .get_value_by_unique(type_name, unique)
            .await?
            .ok_or_else(|| EngineError::not_found(type_name, describe(unique)))
    }

    fn link_type(&self, parent: &Record, key: &str) -> EngineResult<String> {
        self.store.get_link(&parent.type_name, key).ok_or_else(|| {
            EngineError::invalid_argument(format!(
                "Field '{}' on type '{}' is not a relation",
                key, parent.type_name
            ))
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn id_lookup(id: RecordId) -> FieldMap {
    let mut unique = FieldMap::new();
    unique.insert(ID_FIELD.to_string(), Value::String(id));
    unique
}

fn without_nulls(fields: FieldMap) -> FieldMap {
    fields.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

/// Fields of `fields` that differ from the record; lists keep only new
/// elements
fn changed_fields(record: &Record, fields: &FieldMap) -> FieldMap {
    let mut patch = FieldMap::new();
    for (name, value) in fields {
        if name == ID_FIELD {
            continue;
        }
        let existing = record.field(name);
        if existing == Some(value) {
            continue;
        }
        match (value, existing) {
            (Value::List(items), Some(Value::List(stored))) => {
                let added: Vec<Value> = items
                    .iter()
                    .filter(|item| !stored.contains(item))
                    .cloned()
                    .collect();
                if !added.is_empty() {
                    patch.insert(name.clone(), Value::List(added));
                }
            }
            (Value::List(items), None) if items.is_empty() => {}
            _ => {
                patch.insert(name.clone(), value.clone());
            }
        }
    }
    patch
}

/// Drop link ids that were removed from the record since the payload was
/// spliced
fn drop_removed_links(fields: &mut FieldMap, before: &Record, after: &Record) {
    for (name, value) in fields.iter_mut() {
        let Value::List(items) = value else {
            continue;
        };
        let removed: Vec<Value> = match (before.field(name), after.field(name)) {
            (Some(Value::List(old)), Some(Value::List(new))) => {
                old.iter().filter(|id| !new.contains(id)).cloned().collect()
            }
            (Some(Value::List(old)), _) => old.clone(),
            _ => continue,
        };
        items.retain(|id| !removed.contains(id));
    }
}

/// The node's parent record and the field it was reached through
fn parent_field<'r>(
    current: &'r Option<Record>,
    slot: &'r Slot,
    operation: &str,
) -> EngineResult<(&'r Record, &'r str)> {
    match (current, &slot.key) {
        (Some(parent), Some(key)) => Ok((parent, key.as_str())),
        _ => Err(EngineError::invalid_argument(format!(
            "{} needs a parent record and relation field",
            operation
        ))),
    }
}

/// Merge a nested result into the parent payload it belongs to
fn splice(maps: &mut [FieldMap], resolved: Resolved) {
    let (Some(index), Some(key)) = (resolved.index, resolved.key) else {
        return;
    };
    let Some(fields) = maps.get_mut(index) else {
        return;
    };

    if let Some(Value::List(items)) = fields.get_mut(&key) {
        match resolved.link {
            Link::None => {}
            Link::One(id) => {
                let id = Value::String(id);
                if !items.contains(&id) {
                    items.push(id);
                }
            }
            Link::Many(ids) => {
                let mut merged: Vec<Value> = ids.into_iter().map(Value::String).collect();
                for item in items.drain(..) {
                    if !merged.contains(&item) {
                        merged.push(item);
                    }
                }
                *items = merged;
            }
        }
        return;
    }

    if let Some(value) = resolved.link.into_value() {
        fields.insert(key, value);
    }
}

// ============================================================================
// Tests
// ============================================================================
