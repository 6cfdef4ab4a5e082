use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::glob;
use crate::stampede::StampedeGuard;
use crate::ttl::Ttl;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(deadline) if Instant::now() >= deadline)
    }
}

/// In-process cache backend (spec.md §4.4): `DashMap` for concurrent
/// access plus an intrusive LRU order tracked in a `Mutex<VecDeque<String>>`,
/// bounded by `max_entries`. Grounded on the pack's multi-tier cache file's
/// L1 tier, flattened to spec's single-tier model.
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    order: Mutex<VecDeque<String>>,
    max_entries: usize,
    default_ttl: Option<Ttl>,
    stampede: StampedeGuard,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            max_entries,
            default_ttl: None,
            stampede: StampedeGuard::new(),
        }
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    fn touch(&self, key: &str) {
        let mut order = self.order.lock().expect("lru mutex poisoned");
        if let Some(position) = order.iter().position(|k| k == key) {
            order.remove(position);
        }
        order.push_back(key.to_string());
    }

    fn untrack(&self, key: &str) {
        let mut order = self.order.lock().expect("lru mutex poisoned");
        if let Some(position) = order.iter().position(|k| k == key) {
            order.remove(position);
        }
    }

    fn evict_if_over_capacity(&self) {
        if self.max_entries == 0 {
            return;
        }
        while self.entries.len() > self.max_entries {
            let oldest = {
                let mut order = self.order.lock().expect("lru mutex poisoned");
                order.pop_front()
            };
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Cache-aside read-through with stampede prevention (spec.md §4.4,
    /// §8 scenario 3).
    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Option<Ttl>, compute: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<u8>, CacheError>> + Send + 'static,
    {
        self.stampede.get_or_set(self, key, Ttl::resolve(ttl, self.default_ttl), compute).await
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => {
                let value = entry.value.clone();
                drop(entry);
                self.touch(key);
                return Ok(Some(value));
            }
            None => return Ok(None),
        };
        if expired {
            self.entries.remove(key);
            self.untrack(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> Result<(), CacheError> {
        let effective = Ttl::resolve(ttl, self.default_ttl);
        let expires_at = effective.map(|t| Instant::now() + t.as_duration());
        self.entries.insert(key.to_string(), Entry { value, expires_at });
        self.touch(key);
        self.evict_if_over_capacity();
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        self.untrack(key);
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired() && glob::matches(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        Ok(matching)
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let matching = self.keys(pattern).await?;
        for key in &matching {
            self.delete(key).await?;
        }
        Ok(matching.len() as u64)
    }

    async fn clear(&self, namespace: &str) -> Result<(), CacheError> {
        let prefix = format!("{namespace}:");
        let matching: Vec<String> = self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key == namespace || key.starts_with(&prefix))
            .collect();
        for key in matching {
            self.delete(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MemoryCache::new(10);
        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn expired_entry_is_absent() {
        let cache = MemoryCache::new(10);
        cache.set("k", b"v".to_vec(), Some(Ttl::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overflow_evicts_least_recently_used() {
        let cache = MemoryCache::new(2);
        cache.set("a", b"1".to_vec(), None).await.unwrap();
        cache.set("b", b"2".to_vec(), None).await.unwrap();
        cache.get("a").await.unwrap();
        cache.set("c", b"3".to_vec(), None).await.unwrap();

        assert_eq!(cache.get("b").await.unwrap(), None);
        assert_eq!(cache.get("a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(cache.get("c").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn delete_by_pattern_removes_matching_keys_only() {
        let cache = MemoryCache::new(10);
        cache.set("session:a", b"1".to_vec(), None).await.unwrap();
        cache.set("session:b", b"2".to_vec(), None).await.unwrap();
        cache.set("user:a", b"3".to_vec(), None).await.unwrap();

        let deleted = cache.delete_by_pattern("session:*").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(cache.get("user:a").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test]
    async fn get_or_set_computes_exactly_once_under_concurrency() {
        let cache = Arc::new(MemoryCache::new(100));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_set("k", Some(Ttl::from_secs(60)), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(b"v".to_vec())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), b"v".to_vec());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn get_or_set_propagates_failure_to_all_waiters_and_writes_nothing() {
        let cache = Arc::new(MemoryCache::new(10));
        let result = cache
            .get_or_set("k", None, || async { Err(CacheError::Backend("boom".to_string())) })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
