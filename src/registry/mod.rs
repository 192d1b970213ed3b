//! Resource descriptors and the registry built from them
//!
//! The registry is the closed, startup-time list of every fetchable
//! resource. Each descriptor derives a storage slot, a loader, and a set
//! of accessors; nothing outside the registry can be addressed at
//! runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{CacheError, CacheResult};

/// Pure projection applied to a raw asset payload before storage
pub type Extract = Arc<dyn Fn(&Value) -> CacheResult<Value> + Send + Sync>;

/// Homogeneous collection of entities, each carrying a unique `id`
#[derive(Debug, Clone)]
pub struct FlatResource {
    /// Resource name; also the slot name and the response payload field
    pub name: String,
    /// Path segment under `/api/`
    pub endpoint: String,
}

/// Single named blob fetched from the theme asset store
#[derive(Clone)]
pub struct AssetResource {
    /// Resource name; also the slot name
    pub name: String,
    /// Asset folder, e.g. `config`
    pub folder: String,
    /// Asset filename, e.g. `settings_data.json`
    pub filename: String,
    /// Fields requested from the asset endpoint (`fields=` parameter)
    pub search_fields: Vec<String>,
    /// Projection applied to the raw asset object before storage
    pub extract: Extract,
}

impl AssetResource {
    /// Asset key as addressed by the remote store: `{folder}/{filename}`
    pub fn key(&self) -> String {
        format!("{}/{}", self.folder, self.filename)
    }
}

impl fmt::Debug for AssetResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetResource")
            .field("name", &self.name)
            .field("folder", &self.folder)
            .field("filename", &self.filename)
            .field("search_fields", &self.search_fields)
            .finish_non_exhaustive()
    }
}

/// Collection partitioned by the id of a parent flat collection entity
#[derive(Debug, Clone)]
pub struct ChildResource {
    /// Name of the parent flat collection
    pub parent: String,
    /// Child collection name; also the keyed-map slot name
    pub child: String,
}

/// One fetchable resource
#[derive(Debug, Clone)]
pub enum Resource {
    Flat(FlatResource),
    Asset(AssetResource),
    Child(ChildResource),
}

impl Resource {
    /// The name a resource is addressed by
    pub fn name(&self) -> &str {
        match self {
            Resource::Flat(flat) => &flat.name,
            Resource::Asset(asset) => &asset.name,
            Resource::Child(child) => &child.child,
        }
    }
}

/// The closed set of resource descriptors, keyed by resource name
#[derive(Debug, Default)]
pub struct Registry {
    resources: HashMap<String, Resource>,
}

impl Registry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The stock storefront catalog: `products`, `collects`, `blogs`,
    /// and `shop` flat collections, the `settings_data` theme asset,
    /// and `articles` partitioned by blog.
    pub fn storefront() -> Self {
        Self::builder()
            .flat("products")
            .flat("collects")
            .flat("blogs")
            .flat("shop")
            .asset(AssetResource {
                name: "settings_data".to_string(),
                folder: "config".to_string(),
                filename: "settings_data.json".to_string(),
                search_fields: vec!["value".to_string()],
                extract: Arc::new(|asset: &Value| {
                    let raw = asset.get("value").and_then(Value::as_str).ok_or_else(|| {
                        CacheError::extract("settings_data", "asset has no string `value` field")
                    })?;
                    serde_json::from_str::<Value>(raw)
                        .map_err(|e| CacheError::extract("settings_data", e.to_string()))
                }),
            })
            .child("blogs", "articles")
            .build()
            .expect("stock catalog is valid")
    }

    /// Look up a resource by name
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Look up a resource by name, panicking on an unknown name.
    ///
    /// # Panics
    ///
    /// The registry is closed at startup, so addressing an undeclared
    /// resource is a programming error, not a recoverable condition.
    pub fn expect(&self, name: &str) -> &Resource {
        self.get(name)
            .unwrap_or_else(|| panic!("resource `{name}` is not declared in the registry"))
    }

    /// Names of plain (single-value) slots: flat collections and assets
    pub fn plain_slots(&self) -> impl Iterator<Item = &str> {
        self.resources.values().filter_map(|r| match r {
            Resource::Flat(_) | Resource::Asset(_) => Some(r.name()),
            Resource::Child(_) => None,
        })
    }

    /// Names of keyed-map slots: child collections
    pub fn keyed_slots(&self) -> impl Iterator<Item = &str> {
        self.resources.values().filter_map(|r| match r {
            Resource::Child(_) => Some(r.name()),
            _ => None,
        })
    }
}

/// Builder validating the descriptor set before it is closed
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<Resource>,
}

impl RegistryBuilder {
    /// Declare a flat collection whose endpoint equals its name
    pub fn flat(self, name: impl Into<String>) -> Self {
        let name = name.into();
        let endpoint = name.clone();
        self.flat_at(name, endpoint)
    }

    /// Declare a flat collection with an explicit endpoint path
    pub fn flat_at(mut self, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.entries.push(Resource::Flat(FlatResource {
            name: name.into(),
            endpoint: endpoint.into(),
        }));
        self
    }

    /// Declare a theme asset
    pub fn asset(mut self, asset: AssetResource) -> Self {
        self.entries.push(Resource::Asset(asset));
        self
    }

    /// Declare a child collection partitioned by `parent` entity ids
    pub fn child(mut self, parent: impl Into<String>, child: impl Into<String>) -> Self {
        self.entries.push(Resource::Child(ChildResource {
            parent: parent.into(),
            child: child.into(),
        }));
        self
    }

    /// Close the registry, validating name uniqueness and child/parent
    /// references
    pub fn build(self) -> CacheResult<Registry> {
        let mut resources = HashMap::new();
        for entry in &self.entries {
            if resources
                .insert(entry.name().to_string(), entry.clone())
                .is_some()
            {
                return Err(CacheError::Registry(format!(
                    "duplicate resource name `{}`",
                    entry.name()
                )));
            }
        }
        for entry in &self.entries {
            if let Resource::Child(ChildResource { parent, child }) = entry {
                match resources.get(parent.as_str()) {
                    Some(Resource::Flat(_)) => {}
                    Some(_) => {
                        return Err(CacheError::Registry(format!(
                            "parent of `{child}` must be a flat collection, `{parent}` is not"
                        )))
                    }
                    None => {
                        return Err(CacheError::Registry(format!(
                            "child collection `{child}` references undeclared parent `{parent}`"
                        )))
                    }
                }
            }
        }
        Ok(Registry { resources })
    }
}

/// Uppercase the first character: `products` -> `Products`
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strip one trailing `s`: `blogs` -> `blog`
pub fn singularize(s: &str) -> &str {
    s.strip_suffix('s').unwrap_or(s)
}

/// Mutation-style label for a commit to `name`: `products` ->
/// `setProducts`, `settings_data` -> `setSettingsData`. Used in commit
/// logs so store subscribers and log readers see the same vocabulary.
pub fn commit_label(name: &str) -> String {
    let mut label = String::from("set");
    for part in name.split('_') {
        label.push_str(&capitalize(part));
    }
    label
}
