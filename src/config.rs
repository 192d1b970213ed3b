//! Shop context configuration
//!
//! Three knobs identify the remote API: the app host, the shop, and the
//! theme whose assets are addressable. They come from the environment,
//! from a TOML file, or from an explicit constructor.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{CacheError, CacheResult};

/// Environment variable naming the API host, e.g. `https://app.example`
pub const ENV_APP_HOST: &str = "SHOPIFY_APP_HOST";
/// Environment variable naming the shop, e.g. `ezracelli-dev`
pub const ENV_APP_SHOP: &str = "SHOPIFY_APP_SHOP";
/// Environment variable naming the theme id, e.g. `72508506189`
pub const ENV_THEME_ID: &str = "SHOPIFY_THEME_ID";

const SHOP_DOMAIN_SUFFIX: &str = ".myshopify.com";

/// Identity of the remote API every request is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopContext {
    /// Base URL of the app host, without a trailing slash
    pub api_host: String,

    /// Shop handle or full `*.myshopify.com` domain
    pub shop: String,

    /// Theme whose assets are fetched
    pub theme_id: String,
}

impl ShopContext {
    /// Create a context from explicit values
    pub fn new(
        api_host: impl Into<String>,
        shop: impl Into<String>,
        theme_id: impl Into<String>,
    ) -> Self {
        Self {
            api_host: api_host.into(),
            shop: shop.into(),
            theme_id: theme_id.into(),
        }
    }

    /// Load the context from the environment
    pub fn from_env() -> CacheResult<Self> {
        Ok(Self::new(
            require_env(ENV_APP_HOST)?,
            require_env(ENV_APP_SHOP)?,
            require_env(ENV_THEME_ID)?,
        ))
    }

    /// Load the context from a TOML file
    pub async fn from_file(path: &Path) -> CacheResult<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| CacheError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "loading shop context");
        toml::from_str(&content).map_err(|e| CacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Full shop domain used as the global `shop` query parameter.
    ///
    /// A bare handle gets the `.myshopify.com` suffix appended; a full
    /// domain passes through unchanged.
    pub fn shop_domain(&self) -> String {
        if self.shop.ends_with(SHOP_DOMAIN_SUFFIX) {
            self.shop.clone()
        } else {
            format!("{}{}", self.shop, SHOP_DOMAIN_SUFFIX)
        }
    }
}

fn require_env(var: &str) -> CacheResult<String> {
    std::env::var(var).map_err(|_| CacheError::ConfigMissing {
        var: var.to_string(),
    })
}
