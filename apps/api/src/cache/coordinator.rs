//! Cache-aside coordinator.
//!
//! Reads: cache hit, else load from the store and populate.
//! Writes: durable store first; only after it succeeds is the stale entry
//! deleted and the new value set. A rejected write never touches the cache.
//!
//! Every cache failure is logged and swallowed. Undecodable entries count as a
//! miss and are deleted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{CacheError, CacheKey, KvCache};

#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn KvCache>,
    ttl: Duration,
}

impl CacheAside {
    pub fn new(cache: Arc<dyn KvCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Returns the cached value for `key`, falling back to `load` on a miss.
    pub async fn read<T, E, F, Fut>(&self, key: CacheKey, load: F) -> Result<Option<T>, E>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<T>, E>> + Send,
    {
        if let Some(hit) = self.peek::<T>(key).await {
            debug!("Cache hit for {key}");
            return Ok(Some(hit));
        }

        debug!("Cache miss for {key}");
        let loaded = load().await?;
        if let Some(value) = &loaded {
            self.populate(key, value).await;
        }
        Ok(loaded)
    }

    /// Runs the durable write, then replaces the cached value with its result.
    pub async fn write<T, E, F, Fut>(&self, key: CacheKey, persist: F) -> Result<T, E>
    where
        T: Serialize + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let value = persist().await?;
        self.refresh(key, &value).await;
        Ok(value)
    }

    /// Cache-only lookup. Failures and undecodable entries read as `None`.
    pub async fn peek<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        let bytes = match self.cache.get(&key.to_string()).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!("Cache read failed for {key}: {e}");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding undecodable cache entry {key}: {e}");
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Replaces the entry for `key` with a value the store has already accepted.
    pub async fn refresh<T: Serialize + Sync>(&self, key: CacheKey, value: &T) {
        self.invalidate(key).await;
        self.populate(key, value).await;
    }

    pub async fn invalidate(&self, key: CacheKey) {
        if let Err(e) = self.cache.delete(&key.to_string()).await {
            warn!("Cache delete failed for {key}: {e}");
        }
    }

    async fn populate<T: Serialize + Sync>(&self, key: CacheKey, value: &T) {
        if let Err(e) = self.store_encoded(key, value).await {
            warn!("Cache populate failed for {key}: {e}");
        }
    }

    async fn store_encoded<T: Serialize + Sync>(&self, key: CacheKey, value: &T) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.cache.set(&key.to_string(), &bytes, self.ttl).await
    }
}
