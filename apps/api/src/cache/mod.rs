//! Key-value cache seam.
//!
//! ```text
//! KvCache (trait)
//!   ├── RedisCache   <- ConnectionManager-based async Redis
//!   └── NoOpCache    <- always-miss fallback when Redis is unreachable
//! CacheAside         <- the only component that mutates cache entries
//! ```
//!
//! The cache is never the system of record. Errors from this layer are logged
//! by `CacheAside` and never reach a caller.

pub mod coordinator;
pub mod redis_cache;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use coordinator::CacheAside;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Always misses and accepts every write.
pub struct NoOpCache;

#[async_trait]
impl KvCache for NoOpCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Namespaced cache keys, one namespace per cached entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKey {
    /// Current location of a user.
    Location(i64),
    /// Most recent swipe made by a user.
    SwipeHistory(i64),
    /// Id of the swipe a user last redid.
    Redo(i64),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Location(user_id) => write!(f, "location:{user_id}"),
            CacheKey::SwipeHistory(user_id) => write!(f, "swipe_history:{user_id}"),
            CacheKey::Redo(user_id) => write!(f, "redo:{user_id}"),
        }
    }
}
