//! storefront-cache - Descriptor-driven client-side cache
//!
//! Fronts a remote resource API (catalog collections, configuration
//! assets, parent/child sub-collections) with a small declarative
//! registry. Each descriptor derives a storage slot, a load-once async
//! fetcher with request dedup, and read-only accessors; a slot reads as
//! "unloaded" until its first successful fetch commits.
//!
//! ```no_run
//! use storefront_cache::{Cache, ShopContext};
//!
//! # async fn demo() -> storefront_cache::CacheResult<()> {
//! let cache = Cache::storefront(ShopContext::from_env()?);
//!
//! cache.ensure("products").await?;
//! let mug = cache.by_id("products", 7);
//!
//! cache.ensure("blogs").await?;
//! cache.ensure_children("articles", None).await?;
//! let posts = cache.child_all("articles");
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod registry;
pub mod slot;
pub mod store;
pub mod transport;

pub use cache::Cache;
pub use config::ShopContext;
pub use error::{CacheError, CacheResult};
pub use registry::Registry;
pub use slot::SlotValue;
pub use store::{MemoryStore, ReactiveStore, StoreAdapter};
pub use transport::{HttpTransport, Transport};
