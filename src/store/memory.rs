//! In-process reactive store

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

use super::ReactiveStore;

/// Buffered change notifications per subscriber before lagging
const CHANGE_BUFFER: usize = 64;

/// In-memory [`ReactiveStore`] with broadcast change notification.
///
/// Plain slots and keyed maps live in separate tables. Locks are held
/// only for the duration of a read or write, never across an await.
pub struct MemoryStore {
    plain: Mutex<HashMap<String, Value>>,
    keyed: Mutex<HashMap<String, HashMap<u64, Value>>>,
    changes: broadcast::Sender<String>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            plain: Mutex::new(HashMap::new()),
            keyed: Mutex::new(HashMap::new()),
            changes,
        }
    }

    fn notify(&self, slot: &str) {
        // Send only fails when no subscriber exists, which is fine
        let _ = self.changes.send(slot.to_string());
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactiveStore for MemoryStore {
    fn read(&self, slot: &str) -> Option<Value> {
        self.plain
            .lock()
            .expect("plain slot table poisoned")
            .get(slot)
            .cloned()
    }

    fn commit(&self, slot: &str, value: Value) {
        self.plain
            .lock()
            .expect("plain slot table poisoned")
            .insert(slot.to_string(), value);
        self.notify(slot);
    }

    fn read_child(&self, slot: &str, parent_id: u64) -> Option<Value> {
        self.keyed
            .lock()
            .expect("keyed slot table poisoned")
            .get(slot)
            .and_then(|entries| entries.get(&parent_id))
            .cloned()
    }

    fn read_child_all(&self, slot: &str) -> Vec<(u64, Value)> {
        let mut entries: Vec<(u64, Value)> = self
            .keyed
            .lock()
            .expect("keyed slot table poisoned")
            .get(slot)
            .map(|entries| entries.iter().map(|(id, v)| (*id, v.clone())).collect())
            .unwrap_or_default();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    fn commit_child(&self, slot: &str, parent_id: u64, value: Value) {
        self.keyed
            .lock()
            .expect("keyed slot table poisoned")
            .entry(slot.to_string())
            .or_default()
            .insert(parent_id, value);
        self.notify(slot);
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}
