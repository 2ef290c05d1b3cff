//! Cache facade over a key/value store with TTL semantics.
//!
//! [`CacheClient`] adds JSON serialization, a default TTL and a per-call
//! timeout on top of any [`KvStore`], and reports every failure as a
//! [`CacheError`] after logging it.

use async_trait::async_trait;
use std::error::Error;
use std::time::Duration;

mod client;
mod memory;

pub use client::CacheClient;
pub use memory::MemoryStore;

/// Error reported by a [`KvStore`] backend.
pub type StoreError = Box<dyn Error + Send + Sync>;

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    /// The key exists and never expires.
    Persistent,
    Expires(Duration),
}

/// Byte-level key/value store with per-key expiry, in the shape of the
/// Redis command set.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Store `value`, replacing any previous value. `None` keeps the key
    /// until it is deleted.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, StoreError>;

    /// Set the expiry of an existing key. Returns `false` if there is no
    /// such key.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Keys matching a glob-style `pattern` (`*`, `?`, `[...]`).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Connection(#[source] StoreError),

    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("cache value could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("invalid key pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}
