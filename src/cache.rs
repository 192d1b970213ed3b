//! The cache facade
//!
//! Wires a registry, shop context, transport, and store together and
//! exposes the full loader and accessor surface addressable by resource
//! name.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::accessor::Accessors;
use crate::config::ShopContext;
use crate::error::CacheResult;
use crate::loader::Loader;
use crate::registry::Registry;
use crate::slot::SlotValue;
use crate::store::{MemoryStore, ReactiveStore, StoreAdapter};
use crate::transport::{HttpTransport, Transport};

/// Descriptor-driven cache over a remote resource API.
///
/// Reads (`all`, `by_id`, `ids`, `child_all`, `child_for`) are pure and
/// synchronous; `ensure` and `ensure_children` are the only operations
/// that touch the network, and each fetches a given slot at most once.
pub struct Cache {
    loader: Loader,
    accessors: Accessors,
    store: Arc<StoreAdapter>,
}

impl Cache {
    /// Create a cache with the in-memory store
    pub fn new(registry: Registry, context: ShopContext, transport: Arc<dyn Transport>) -> Self {
        Self::with_store(registry, context, transport, Arc::new(MemoryStore::new()))
    }

    /// Create a cache over an externally owned reactive store
    pub fn with_store(
        registry: Registry,
        context: ShopContext,
        transport: Arc<dyn Transport>,
        store: Arc<dyn ReactiveStore>,
    ) -> Self {
        let registry = Arc::new(registry);
        let adapter = Arc::new(StoreAdapter::new(&registry, store));
        Self {
            loader: Loader::new(registry.clone(), adapter.clone(), transport, context),
            accessors: Accessors::new(registry, adapter.clone()),
            store: adapter,
        }
    }

    /// Stock storefront catalog over HTTP
    pub fn storefront(context: ShopContext) -> Self {
        Self::new(
            Registry::storefront(),
            context,
            Arc::new(HttpTransport::new()),
        )
    }

    /// Ensure `name` is loaded; at most one fetch per slot, failed
    /// fetches commit nothing and are retried on the next call
    pub async fn ensure(&self, name: &str) -> CacheResult<()> {
        self.loader.ensure(name).await
    }

    /// Ensure child entries exist for the given parents (or all parents
    /// of the loaded parent collection), fetching the missing ones in
    /// parallel
    pub async fn ensure_children(
        &self,
        child_name: &str,
        parent_ids: Option<&[u64]>,
    ) -> CacheResult<()> {
        self.loader.ensure_children(child_name, parent_ids).await
    }

    /// Current value of a flat collection or asset slot
    pub fn all(&self, name: &str) -> SlotValue {
        self.accessors.all(name)
    }

    /// Entity with a numerically equal id, or unloaded
    pub fn by_id(&self, name: &str, id: u64) -> SlotValue {
        self.accessors.by_id(name, id)
    }

    /// Ids projected from a flat collection
    pub fn ids(&self, name: &str) -> Vec<u64> {
        self.accessors.ids(name)
    }

    /// Every loaded child value, flattened across parents
    pub fn child_all(&self, child_name: &str) -> Vec<Value> {
        self.accessors.child_all(child_name)
    }

    /// Child payload for one parent, or unloaded
    pub fn child_for(&self, child_name: &str, parent_id: u64) -> SlotValue {
        self.accessors.child_for(child_name, parent_id)
    }

    /// Change notification: each commit publishes the slot name it
    /// touched
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.store.subscribe()
    }
}
