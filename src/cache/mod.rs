//! Forecast result cache
//!
//! Plain get / set-with-expiry over serialized JSON strings. Redis is used when
//! configured and reachable; otherwise an in-process map with expiry instants.

#[cfg(feature = "redis-cache")]
pub mod redis;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{CacheBackendKind, CacheConfig};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "redis-cache")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ForecastCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Key for a forecast request.
///
/// Only the number of external factors participates, not their values, so
/// requests differing only in factor content share an entry.
pub fn forecast_cache_key(prefix: &str, product_id: &str, horizon: usize, factor_count: usize) -> String {
    format!("{prefix}:{product_id}:{horizon}:{factor_count}")
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }
}

#[async_trait]
impl ForecastCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let store = self.store.read();
            match store.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }
        let mut store = self.store.write();
        if store.get(key).is_some_and(CacheEntry::is_expired) {
            store.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        let mut store = self.store.write();
        store.retain(|_, e| !e.is_expired());
        store.insert(key.to_string(), entry);
        Ok(())
    }
}

/// Cache backend selected by configuration
pub async fn build_cache(cfg: &CacheConfig) -> Arc<dyn ForecastCache> {
    match cfg.backend {
        CacheBackendKind::Memory => {
            tracing::info!("using in-memory forecast cache");
            Arc::new(InMemoryCache::new())
        }
        #[cfg(feature = "redis-cache")]
        CacheBackendKind::Redis => match redis::RedisCache::connect(&cfg.redis_url()).await {
            Ok(cache) => {
                tracing::info!(host = %cfg.redis_host, port = cfg.redis_port, "using redis forecast cache");
                Arc::new(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "redis unavailable, falling back to in-memory forecast cache");
                Arc::new(InMemoryCache::new())
            }
        },
        #[cfg(not(feature = "redis-cache"))]
        CacheBackendKind::Redis => {
            tracing::warn!("built without redis-cache feature, using in-memory forecast cache");
            Arc::new(InMemoryCache::new())
        }
    }
}
