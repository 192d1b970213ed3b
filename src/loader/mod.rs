//! Load-once asynchronous fetchers derived from resource descriptors
//!
//! One loader operation exists per descriptor: `ensure` for flat
//! collections and assets, `ensure_children` for child collections.
//! Every operation is idempotent: it fetches at most once per slot (or
//! per parent id), commits only on success, and leaves a failed slot
//! untouched so the next call retries.
//!
//! # Concurrency
//!
//! A value check alone cannot dedup concurrent callers: both would read
//! the unloaded marker before either fetch resolves. Each slot therefore
//! has an in-flight gate (an async mutex keyed by slot name). The first
//! caller holds the gate across its fetch; later callers park on it and
//! re-check the slot once the winner settles, so at most one request is
//! in flight per slot and attached callers resolve with the winner's
//! outcome. A failed winner commits nothing, which is what keeps the
//! loaded-check-then-fetch sequence retryable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::accessor::collection_ids;
use crate::config::ShopContext;
use crate::error::{CacheError, CacheResult};
use crate::registry::{singularize, AssetResource, ChildResource, FlatResource, Registry, Resource};
use crate::store::StoreAdapter;
use crate::transport::Transport;

/// Derives and runs the per-descriptor load operations
pub struct Loader {
    registry: Arc<Registry>,
    store: Arc<StoreAdapter>,
    transport: Arc<dyn Transport>,
    context: ShopContext,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Loader {
    /// Create a loader over the given collaborators
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<StoreAdapter>,
        transport: Arc<dyn Transport>,
        context: ShopContext,
    ) -> Self {
        Self {
            registry,
            store,
            transport,
            context,
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Ensure `name` is loaded, fetching at most once.
    ///
    /// Returns `Ok(())` without network activity when the slot is
    /// already loaded. For a child collection this defaults the parent
    /// id list, see [`Loader::ensure_children`].
    ///
    /// # Panics
    ///
    /// Panics when `name` is not declared in the registry.
    pub async fn ensure(&self, name: &str) -> CacheResult<()> {
        match self.registry.expect(name) {
            Resource::Flat(flat) => self.ensure_flat(&flat.clone()).await,
            Resource::Asset(asset) => self.ensure_asset(&asset.clone()).await,
            Resource::Child(_) => self.ensure_children(name, None).await,
        }
    }

    /// Ensure child entries exist for `parent_ids`, fetching only the
    /// still-unloaded ones, in parallel.
    ///
    /// With `parent_ids` omitted the current id list of the parent
    /// collection is used; the parent must already be loaded or this
    /// fails with [`CacheError::ParentNotLoaded`] — sequencing the
    /// parent load is the caller's obligation.
    ///
    /// One parent's failure neither blocks nor rolls back the others:
    /// successes stay committed and the aggregate fails with
    /// [`CacheError::Partial`]. Re-invoking retries only the parents
    /// that are still unloaded.
    ///
    /// # Panics
    ///
    /// Panics when `child_name` is not a declared child collection.
    pub async fn ensure_children(
        &self,
        child_name: &str,
        parent_ids: Option<&[u64]>,
    ) -> CacheResult<()> {
        let desc = match self.registry.expect(child_name) {
            Resource::Child(child) => child.clone(),
            _ => panic!("resource `{child_name}` is not a child collection"),
        };

        let ids = match parent_ids {
            Some(ids) => ids.to_vec(),
            None => {
                let parent_slot = self.store.get(&desc.parent);
                if parent_slot.is_unloaded() {
                    return Err(CacheError::ParentNotLoaded {
                        parent: desc.parent.clone(),
                        child: desc.child.clone(),
                    });
                }
                collection_ids(&parent_slot)
            }
        };

        let pending: Vec<u64> = ids
            .into_iter()
            .filter(|id| self.store.get_child(&desc.child, *id).is_unloaded())
            .collect();

        if pending.is_empty() {
            debug!(resource = child_name, "all requested parents already loaded");
            return Ok(());
        }

        let attempted = pending.len();
        let results = join_all(
            pending
                .iter()
                .map(|id| self.ensure_one_child(&desc, *id)),
        )
        .await;

        let failed: Vec<(u64, CacheError)> = pending
            .iter()
            .zip(results)
            .filter_map(|(id, result)| result.err().map(|e| (*id, e)))
            .collect();

        if failed.is_empty() {
            return Ok(());
        }
        for (id, err) in &failed {
            warn!(
                resource = child_name,
                parent = singularize(&desc.parent),
                parent_id = id,
                error = %err,
                "child fetch failed"
            );
        }
        Err(CacheError::Partial {
            child: desc.child,
            attempted,
            failed,
        })
    }

    async fn ensure_flat(&self, flat: &FlatResource) -> CacheResult<()> {
        if self.store.get(&flat.name).is_loaded() {
            debug!(resource = %flat.name, "already loaded");
            return Ok(());
        }
        let gate = self.gate(&flat.name);
        let _held = gate.lock().await;
        if self.store.get(&flat.name).is_loaded() {
            // A concurrent caller committed while we waited on the gate
            return Ok(());
        }

        let url = self.flat_url(flat);
        info!(resource = %flat.name, %url, "loading collection");
        let body = self.transport.get_json(&url).await?;
        let payload = unwrap_field(&body, &flat.name, &flat.name)?;
        self.store.set(&flat.name, payload);
        Ok(())
    }

    async fn ensure_asset(&self, asset: &AssetResource) -> CacheResult<()> {
        if self.store.get(&asset.name).is_loaded() {
            debug!(resource = %asset.name, "already loaded");
            return Ok(());
        }
        let gate = self.gate(&asset.name);
        let _held = gate.lock().await;
        if self.store.get(&asset.name).is_loaded() {
            return Ok(());
        }

        let url = self.asset_url(asset);
        info!(resource = %asset.name, %url, "loading asset");
        let body = self.transport.get_json(&url).await?;
        let raw = unwrap_field(&body, &asset.name, "asset")?;
        let extracted = (asset.extract)(&raw)?;
        self.store.set(&asset.name, extracted);
        Ok(())
    }

    async fn ensure_one_child(&self, desc: &ChildResource, parent_id: u64) -> CacheResult<()> {
        let gate = self.gate(&format!("{}/{parent_id}", desc.child));
        let _held = gate.lock().await;
        if self.store.get_child(&desc.child, parent_id).is_loaded() {
            return Ok(());
        }

        let url = self.child_url(desc, parent_id);
        info!(
            resource = %desc.child,
            parent = singularize(&desc.parent),
            parent_id,
            %url,
            "loading child collection"
        );
        let body = self.transport.get_json(&url).await?;
        let payload = unwrap_field(&body, &desc.child, &desc.child)?;
        self.store.set_child(&desc.child, parent_id, payload);
        Ok(())
    }

    /// In-flight gate for one slot (or one keyed-map entry)
    fn gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().expect("gate table poisoned");
        gates.entry(key.to_string()).or_default().clone()
    }

    fn global_query(&self) -> Vec<(String, String)> {
        vec![("shop".to_string(), self.context.shop_domain())]
    }

    fn flat_url(&self, flat: &FlatResource) -> String {
        let query = merge_query(vec![], self.global_query());
        format!(
            "{}/api/{}?{}",
            self.context.api_host,
            flat.endpoint,
            query_string(&query)
        )
    }

    fn child_url(&self, desc: &ChildResource, parent_id: u64) -> String {
        let query = merge_query(vec![], self.global_query());
        format!(
            "{}/api/{}/{}/{}?{}",
            self.context.api_host,
            desc.parent,
            parent_id,
            desc.child,
            query_string(&query)
        )
    }

    fn asset_url(&self, asset: &AssetResource) -> String {
        let mut specific = vec![("asset[key]".to_string(), asset.key())];
        if !asset.search_fields.is_empty() {
            specific.push(("fields".to_string(), asset.search_fields.join(",")));
        }
        let query = merge_query(specific, self.global_query());
        format!(
            "{}/api/themes/{}/assets?{}",
            self.context.api_host,
            self.context.theme_id,
            query_string(&query)
        )
    }
}

/// Pull the expected payload field out of a response envelope
fn unwrap_field(body: &Value, resource: &str, field: &str) -> CacheResult<Value> {
    body.get(field)
        .cloned()
        .ok_or_else(|| CacheError::missing_field(resource, field))
}

/// Merge descriptor-specific query pairs with the global pairs; on a key
/// collision the global pair wins, and global pairs always come last
fn merge_query(
    specific: Vec<(String, String)>,
    global: Vec<(String, String)>,
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = specific
        .into_iter()
        .filter(|(key, _)| !global.iter().any(|(g, _)| g == key))
        .collect();
    merged.extend(global);
    merged
}

/// Render query pairs as an encoded query string, preserving order
fn query_string(pairs: &[(String, String)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}
