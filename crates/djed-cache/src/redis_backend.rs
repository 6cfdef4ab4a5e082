#![cfg(feature = "redis-backend")]

use std::future::Future;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::glob;
use crate::stampede::StampedeGuard;
use crate::ttl::Ttl;

/// Redis-backed cache (spec.md §4.4). LRU eviction is delegated entirely to
/// Redis's own `maxmemory-policy` (SPEC_FULL.md's Open Question
/// resolution) — this backend never tracks recency itself.
pub struct RedisCache {
    connection: ConnectionManager,
    default_ttl: Option<Ttl>,
    stampede: StampedeGuard,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Backend(e.to_string()))?;
        let connection = ConnectionManager::new(client).await.map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(Self { connection, default_ttl: None, stampede: StampedeGuard::new() })
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Option<Ttl>, compute: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<u8>, CacheError>> + Send + 'static,
    {
        self.stampede.get_or_set(self, key, Ttl::resolve(ttl, self.default_ttl), compute).await
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let effective = Ttl::resolve(ttl, self.default_ttl);
        match effective {
            Some(ttl) => {
                let seconds = ttl.as_duration().as_secs().max(1);
                conn.set_ex(key, value, seconds).await.map_err(|e| CacheError::Backend(e.to_string()))
            }
            None => conn.set(key, value).await.map_err(|e| CacheError::Backend(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(key).await.map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        conn.exists(key).await.map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        // Redis' own glob differs subtly from spec's `*`/`**` grammar, so a
        // full `KEYS`/`SCAN` is fetched and filtered through the shared
        // matcher to keep semantics identical to the in-memory backend.
        let mut conn = self.connection.clone();
        let all: Vec<String> = conn.keys("*").await.map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(all.into_iter().filter(|key| glob::matches(pattern, key)).collect())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let matching = self.keys(pattern).await?;
        if matching.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        conn.del::<_, ()>(matching.clone()).await.map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(matching.len() as u64)
    }

    async fn clear(&self, namespace: &str) -> Result<(), CacheError> {
        let prefix = format!("{namespace}:");
        let mut conn = self.connection.clone();
        let all: Vec<String> = conn.keys("*").await.map_err(|e| CacheError::Backend(e.to_string()))?;
        let matching: Vec<String> = all.into_iter().filter(|key| key == namespace || key.starts_with(&prefix)).collect();
        if !matching.is_empty() {
            conn.del::<_, ()>(matching).await.map_err(|e| CacheError::Backend(e.to_string()))?;
        }
        Ok(())
    }
}
