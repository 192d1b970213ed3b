//! HTTP transport contract and the reqwest-backed default
//!
//! The cache never talks to the network directly; loaders go through
//! [`Transport`], which tests replace with a scripted double.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CacheError, CacheResult};

/// One-method transport contract: GET a URL, decode the body as JSON.
///
/// Implementations fail with [`CacheError::Transport`] on network
/// errors, [`CacheError::Status`] on non-success status codes, and
/// [`CacheError::Decode`] when the body is not valid JSON.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> CacheResult<Value>;
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
///
/// Credentialed requests (session cookies, auth headers) are the
/// embedding application's concern; pass a preconfigured client via
/// [`HttpTransport::with_client`].
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a default client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a transport around a preconfigured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> CacheResult<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::transport(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CacheError::transport(url, e.to_string()))?;

        serde_json::from_str(&body).map_err(|source| CacheError::Decode {
            url: url.to_string(),
            source,
        })
    }
}
