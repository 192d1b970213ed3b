//! Read-only derivations over the store
//!
//! Accessors are pure and synchronous; they never trigger network
//! activity. Pairing them with the loader is the caller's job.

use std::sync::Arc;

use serde_json::Value;

use crate::registry::{Registry, Resource};
use crate::slot::SlotValue;
use crate::store::StoreAdapter;

/// Lookup and projection surface derived from the registry
pub struct Accessors {
    registry: Arc<Registry>,
    store: Arc<StoreAdapter>,
}

impl Accessors {
    /// Create accessors over the given collaborators
    pub fn new(registry: Arc<Registry>, store: Arc<StoreAdapter>) -> Self {
        Self { registry, store }
    }

    /// Current slot value of a flat collection or asset, possibly
    /// unloaded.
    ///
    /// # Panics
    ///
    /// Panics on an undeclared name, or on a child collection name
    /// (use [`Accessors::child_all`] for those).
    pub fn all(&self, name: &str) -> SlotValue {
        match self.registry.expect(name) {
            Resource::Flat(_) | Resource::Asset(_) => self.store.get(name),
            Resource::Child(_) => {
                panic!("`{name}` is a child collection; use child_all or child_for")
            }
        }
    }

    /// Entity with a numerically equal id, or unloaded.
    ///
    /// An unloaded collection and an id miss are indistinguishable
    /// here: both yield `Unloaded`. Ids compare numerically, so string
    /// ids in the payload match their numeric form.
    pub fn by_id(&self, name: &str, id: u64) -> SlotValue {
        let entities = match self.all(name) {
            SlotValue::Loaded(Value::Array(entities)) => entities,
            _ => return SlotValue::Unloaded,
        };
        entities
            .into_iter()
            .find(|entity| entity_id(entity) == Some(id))
            .map(SlotValue::Loaded)
            .unwrap_or(SlotValue::Unloaded)
    }

    /// Ids projected from a flat collection, empty when the slot does
    /// not currently hold a loaded array
    pub fn ids(&self, name: &str) -> Vec<u64> {
        collection_ids(&self.all(name))
    }

    /// Every child value across all loaded parent entries, flattened
    /// one level; unloaded entries are simply absent
    pub fn child_all(&self, child_name: &str) -> Vec<Value> {
        let mut values = Vec::new();
        for (_, payload) in self.store.get_child_all(child_name) {
            match payload {
                Value::Array(entries) => values.extend(entries),
                other => values.push(other),
            }
        }
        values
    }

    /// Keyed-map entry for one parent, or unloaded
    pub fn child_for(&self, child_name: &str, parent_id: u64) -> SlotValue {
        self.store.get_child(child_name, parent_id)
    }
}

/// Numeric id of an entity; payloads carry ids as numbers or numeric
/// strings and both compare numerically
pub(crate) fn entity_id(entity: &Value) -> Option<u64> {
    match entity.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ids of every entity in a loaded collection slot, empty when the slot
/// is unloaded or not an array
pub(crate) fn collection_ids(slot: &SlotValue) -> Vec<u64> {
    match slot.as_loaded() {
        Some(Value::Array(entities)) => entities.iter().filter_map(entity_id).collect(),
        _ => vec![],
    }
}
