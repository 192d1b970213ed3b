//! Slot-policy layer over the reactive store

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use super::ReactiveStore;
use crate::registry::{commit_label, Registry};
use crate::slot::SlotValue;

/// Typed slot access over an opaque [`ReactiveStore`].
///
/// The adapter owns the slot policy: the set of slots is declared once
/// from the registry, reading a declared-but-never-committed slot (or
/// keyed-map entry) yields [`SlotValue::Unloaded`], and a committed slot
/// is never reset. Every read site gets "value or unloaded" by
/// construction rather than by per-call-site checks.
///
/// # Panics
///
/// All operations panic when addressed with an undeclared slot name, or
/// with a plain slot where a keyed-map slot is expected (and vice
/// versa). The registry is closed at startup, so these are programming
/// errors, not recoverable conditions.
pub struct StoreAdapter {
    store: Arc<dyn ReactiveStore>,
    plain: HashSet<String>,
    keyed: HashSet<String>,
}

impl StoreAdapter {
    /// Declare every registry slot over `store`
    pub fn new(registry: &Registry, store: Arc<dyn ReactiveStore>) -> Self {
        Self {
            plain: registry.plain_slots().map(str::to_string).collect(),
            keyed: registry.keyed_slots().map(str::to_string).collect(),
            store,
        }
    }

    /// Read a plain slot, defaulting to unloaded
    pub fn get(&self, slot: &str) -> SlotValue {
        self.assert_plain(slot);
        match self.store.read(slot) {
            Some(value) => SlotValue::Loaded(value),
            None => SlotValue::Unloaded,
        }
    }

    /// Overwrite a plain slot
    pub fn set(&self, slot: &str, value: Value) {
        self.assert_plain(slot);
        debug!(slot, mutation = %commit_label(slot), "commit");
        self.store.commit(slot, value);
    }

    /// Read one keyed-map entry, defaulting to unloaded
    pub fn get_child(&self, slot: &str, parent_id: u64) -> SlotValue {
        self.assert_keyed(slot);
        match self.store.read_child(slot, parent_id) {
            Some(value) => SlotValue::Loaded(value),
            None => SlotValue::Unloaded,
        }
    }

    /// All committed keyed-map entries, ordered by parent id
    pub fn get_child_all(&self, slot: &str) -> Vec<(u64, Value)> {
        self.assert_keyed(slot);
        self.store.read_child_all(slot)
    }

    /// Insert or overwrite one keyed-map entry
    pub fn set_child(&self, slot: &str, parent_id: u64, value: Value) {
        self.assert_keyed(slot);
        debug!(slot, parent_id, mutation = %commit_label(slot), "commit");
        self.store.commit_child(slot, parent_id, value);
    }

    /// Subscribe to slot change notification
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.store.subscribe()
    }

    fn assert_plain(&self, slot: &str) {
        if !self.plain.contains(slot) {
            if self.keyed.contains(slot) {
                panic!("slot `{slot}` is a keyed map; use the child accessors");
            }
            panic!("slot `{slot}` is not declared in the registry");
        }
    }

    fn assert_keyed(&self, slot: &str) {
        if !self.keyed.contains(slot) {
            if self.plain.contains(slot) {
                panic!("slot `{slot}` is a plain slot, not a keyed map");
            }
            panic!("slot `{slot}` is not declared in the registry");
        }
    }
}
