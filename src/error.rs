//! Error types for the storefront cache
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in the cache engine
#[derive(Error, Debug)]
pub enum CacheError {
    // Transport errors
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    // Payload errors
    #[error("Response for {resource} has no `{field}` field")]
    MissingField { resource: String, field: String },

    #[error("Asset projection for {resource} failed: {reason}")]
    Extract { resource: String, reason: String },

    // Loader sequencing errors
    #[error("Cannot default parent ids for {child}: parent collection {parent} is not loaded")]
    ParentNotLoaded { parent: String, child: String },

    #[error("Child collection {child}: {} of {attempted} fetches failed", .failed.len())]
    Partial {
        child: String,
        attempted: usize,
        failed: Vec<(u64, CacheError)>,
    },

    // Registry errors
    #[error("Invalid registry: {0}")]
    Registry(String),

    // Configuration errors
    #[error("Missing environment variable: {var}")]
    ConfigMissing { var: String },

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CacheError {
    /// Create a transport error
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-field error
    pub fn missing_field(resource: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            resource: resource.into(),
            field: field.into(),
        }
    }

    /// Create an asset projection error
    pub fn extract(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extract {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Check if re-invoking the failed operation may succeed.
    ///
    /// Failed loads never commit, so every transport-level failure is
    /// retryable by calling the same `ensure` again. A `Partial` retry
    /// skips the parents that already committed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Status { .. } | Self::Decode { .. } | Self::Partial { .. }
        )
    }

    /// Parent ids that failed in a `Partial` aggregate, empty otherwise
    pub fn failed_parents(&self) -> Vec<u64> {
        match self {
            Self::Partial { failed, .. } => failed.iter().map(|(id, _)| *id).collect(),
            _ => vec![],
        }
    }
}
