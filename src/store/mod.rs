//! Reactive state store contract and the unloaded-defaulting adapter
//!
//! The store itself is an external collaborator: an opaque key-value
//! container with subscribable change notification and a commit
//! primitive. [`MemoryStore`] is the in-process default. [`StoreAdapter`]
//! layers the cache's slot policy on top: every declared slot reads as
//! [`SlotValue::Unloaded`] until its first commit, keyed-map entries
//! default the same way, and addressing an undeclared slot is fatal.

mod adapter;
mod memory;

pub use adapter::StoreAdapter;
pub use memory::MemoryStore;

use serde_json::Value;
use tokio::sync::broadcast;

/// Contract the cache consumes from the reactive state container.
///
/// `read` returns `None` for keys that were never committed; the
/// default-to-unloaded policy lives in [`StoreAdapter`], not here.
/// Keyed-map commits address one `(slot, parent_id)` entry and leave
/// every other entry untouched.
pub trait ReactiveStore: Send + Sync {
    /// Read a plain slot, `None` if never committed
    fn read(&self, slot: &str) -> Option<Value>;

    /// Overwrite a plain slot and notify subscribers
    fn commit(&self, slot: &str, value: Value);

    /// Read one keyed-map entry, `None` if never committed
    fn read_child(&self, slot: &str, parent_id: u64) -> Option<Value>;

    /// All committed keyed-map entries for a slot
    fn read_child_all(&self, slot: &str) -> Vec<(u64, Value)>;

    /// Insert or overwrite one keyed-map entry and notify subscribers
    fn commit_child(&self, slot: &str, parent_id: u64, value: Value);

    /// Subscribe to change notification; each commit publishes the name
    /// of the slot it touched
    fn subscribe(&self) -> broadcast::Receiver<String>;
}
