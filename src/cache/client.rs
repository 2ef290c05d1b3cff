use super::{CacheError, KeyTtl, KvStore, StoreError};
use crate::config::CacheConfig;
use crate::fields;
use crate::logger::{get_logger, Logger};
use crate::value::Fields;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Typed cache client over a [`KvStore`].
///
/// Values are stored as JSON. Every operation is bounded by
/// [`CacheConfig::timeout`]; failures are logged at ERROR through the
/// `cache` logger and returned as [`CacheError`]. A missing key is reported
/// as [`CacheError::NotFound`] and logged at DEBUG only.
#[derive(Clone)]
pub struct CacheClient {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
    logger: Logger,
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("config", &self.config)
            .field("logger", &self.logger.name())
            .finish_non_exhaustive()
    }
}

impl CacheClient {
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        CacheClient {
            store,
            config,
            logger: get_logger("cache"),
        }
    }

    /// Log through `logger` instead of the process default `cache` logger.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    async fn call<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.config.timeout, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::Connection(e)),
            Err(_) => Err(CacheError::Timeout(self.config.timeout)),
        }
    }

    fn failed(&self, message: &str, mut fields: Fields, err: &CacheError) {
        fields.insert("error".to_string(), err.to_string().into());
        self.logger.error_with(message, fields, err);
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let result = self.call(self.store.ping()).await;
        if let Err(e) = &result {
            self.failed("cache ping failed", Fields::new(), e);
        }
        result
    }

    /// Store `value` under `key`.
    ///
    /// **Parameters**
    /// - `key`: cache key.
    /// - `value`: anything `serde` can serialize; it is stored as JSON.
    /// - `ttl`: lifetime of the entry, or [`CacheConfig::default_ttl`] when
    ///   `None`. A zero TTL expires the key immediately, so the call removes
    ///   any value already stored under `key`.
    ///
    /// **Returns**
    /// - `Ok(())` once the store accepted the value.
    /// - `Err(CacheError::Serialization)` if `value` cannot be encoded.
    /// - `Err(CacheError::Connection | CacheError::Timeout)` if the store
    ///   failed or did not answer within [`CacheConfig::timeout`].
    ///
    /// Failures are logged at ERROR before they are returned.
    pub async fn store<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<(), CacheError>
    where
        T: Serialize + ?Sized,
    {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let result = match serde_json::to_vec(value) {
            Ok(bytes) => {
                let size = bytes.len();
                self.call(self.store.set(key, bytes, Some(ttl)))
                    .await
                    .map(|()| size)
            }
            Err(e) => Err(CacheError::from(e)),
        };
        match result {
            Ok(size) => {
                self.logger.debug(
                    "stored value",
                    fields! { "key" => key, "size_bytes" => size, "ttl_secs" => ttl.as_secs_f64() },
                );
                Ok(())
            }
            Err(e) => {
                self.failed("failed to store value", fields! { "key" => key }, &e);
                Err(e)
            }
        }
    }

    /// Fetch and decode the value stored under `key`.
    ///
    /// **Returns**
    /// - `Ok(value)` if the key exists and decodes as `T`.
    /// - `Err(CacheError::NotFound)` if the key is missing or expired. This
    ///   is logged at DEBUG only.
    /// - `Err(CacheError::Serialization)` if the stored JSON is not a `T`.
    /// - `Err(CacheError::Connection | CacheError::Timeout)` on store failure.
    pub async fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheError> {
        let result = match self.call(self.store.get(key)).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes)
                .map(|value| (value, bytes.len()))
                .map_err(CacheError::from),
            Ok(None) => Err(CacheError::NotFound(key.to_string())),
            Err(e) => Err(e),
        };
        match result {
            Ok((value, size)) => {
                self.logger
                    .debug("retrieved value", fields! { "key" => key, "size_bytes" => size });
                Ok(value)
            }
            Err(e) if e.is_not_found() => {
                self.logger.debug("key not found", fields! { "key" => key });
                Err(e)
            }
            Err(e) => {
                self.failed("failed to retrieve value", fields! { "key" => key }, &e);
                Err(e)
            }
        }
    }

    /// Returns whether the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        match self.call(self.store.delete(key)).await {
            Ok(existed) => {
                self.logger
                    .debug("deleted key", fields! { "key" => key, "existed" => existed });
                Ok(existed)
            }
            Err(e) => {
                self.failed("failed to delete key", fields! { "key" => key }, &e);
                Err(e)
            }
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let result = self.call(self.store.exists(key)).await;
        if let Err(e) = &result {
            self.failed("failed to check key existence", fields! { "key" => key }, e);
        }
        result
    }

    pub async fn get_ttl(&self, key: &str) -> Result<KeyTtl, CacheError> {
        let result = self.call(self.store.ttl(key)).await;
        if let Err(e) = &result {
            self.failed("failed to get ttl", fields! { "key" => key }, e);
        }
        result
    }

    /// Update the expiry of an existing key. Returns `false` if the key
    /// does not exist.
    pub async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let result = self.call(self.store.expire(key, ttl)).await;
        if let Err(e) = &result {
            self.failed("failed to set ttl", fields! { "key" => key }, e);
        }
        result
    }

    /// Keys matching a glob-style `pattern`, sorted.
    pub async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let result = match glob::Pattern::new(pattern) {
            Ok(_) => self.call(self.store.keys(pattern)).await,
            Err(source) => Err(CacheError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }),
        };
        if let Err(e) = &result {
            self.failed("failed to list keys", fields! { "pattern" => pattern }, e);
        }
        result
    }
}
