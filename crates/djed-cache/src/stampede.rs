use std::future::Future;
use std::pin::Pin;

use dashmap::DashMap;
use futures::future::{FutureExt, Shared};

use crate::cache::Cache;
use crate::error::CacheError;
use crate::ttl::Ttl;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Per-backend in-flight computation tracker (spec.md §4.4, §8 scenario 3,
/// §9's "cache in-flight de-duplication" note). Exactly one `compute` runs
/// per absent key even under concurrent `get_or_set` callers; the map entry
/// is removed on both the success and failure path.
pub struct StampedeGuard {
    pending: DashMap<String, Shared<BoxFuture<'static, Result<Vec<u8>, CacheError>>>>,
}

impl StampedeGuard {
    pub fn new() -> Self {
        Self { pending: DashMap::new() }
    }

    /// Cache-aside with stampede prevention: returns the cached value if
    /// present, otherwise drives (or joins) the single in-flight `compute`
    /// for `key` and writes its result back with `ttl` on success.
    pub async fn get_or_set<C, F, Fut>(&self, cache: &C, key: &str, ttl: Option<Ttl>, compute: F) -> Result<Vec<u8>, CacheError>
    where
        C: Cache + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<u8>, CacheError>> + Send + 'static,
    {
        if let Some(value) = cache.get(key).await? {
            return Ok(value);
        }

        let shared = self
            .pending
            .entry(key.to_string())
            .or_insert_with(|| {
                let boxed: BoxFuture<'static, Result<Vec<u8>, CacheError>> = Box::pin(compute());
                boxed.shared()
            })
            .clone();

        let result = shared.await;
        self.pending.remove(key);

        if let Ok(ref value) = result {
            cache.set(key, value.clone(), ttl).await?;
        }
        result
    }
}

impl Default for StampedeGuard {
    fn default() -> Self {
        Self::new()
    }
}
