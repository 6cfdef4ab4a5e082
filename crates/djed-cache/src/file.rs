use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::glob;
use crate::stampede::StampedeGuard;
use crate::ttl::Ttl;

/// Namespaced-directory cache backend (spec.md §4.4): one file per key under
/// `root`, storing a small JSON envelope `{value, expires_at_ms}`. Bounded
/// per-backend configuration rather than an in-process LRU, per spec.md
/// §4.4's "Redis/file backends: ... bounded (file) per backend
/// configuration".
pub struct FileCache {
    root: PathBuf,
    default_ttl: Option<Ttl>,
    stampede: StampedeGuard,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Envelope {
    /// Kept alongside the value because the filename is a lossy encoding
    /// of the key (non-alphanumeric characters collapse to `_`); `keys`/
    /// `delete_by_pattern` need the original string to match against.
    key: String,
    value: Vec<u8>,
    expires_at_ms: Option<u64>,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), default_ttl: None, stampede: StampedeGuard::new() }
    }

    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let encoded: String = key.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect();
        self.root.join(format!("{encoded}.json"))
    }

    async fn read_envelope_if_live(path: &Path) -> Result<Option<Envelope>, CacheError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Backend(e.to_string())),
        };
        let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|e| CacheError::Serialization(e.to_string()))?;
        if let Some(deadline) = envelope.expires_at_ms {
            if now_ms() >= deadline {
                let _ = tokio::fs::remove_file(path).await;
                return Ok(None);
            }
        }
        Ok(Some(envelope))
    }

    async fn read_if_live(path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(Self::read_envelope_if_live(path).await?.map(|envelope| envelope.value))
    }

    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Option<Ttl>, compute: F) -> Result<Vec<u8>, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Vec<u8>, CacheError>> + Send + 'static,
    {
        self.stampede.get_or_set(self, key, Ttl::resolve(ttl, self.default_ttl), compute).await
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as u64
}

#[async_trait]
impl Cache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Self::read_if_live(&self.path_for(key)).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| CacheError::Backend(e.to_string()))?;
        let effective = Ttl::resolve(ttl, self.default_ttl);
        let expires_at_ms = effective.map(|t| now_ms() + t.as_duration().as_millis() as u64);
        let envelope = Envelope { key: key.to_string(), value, expires_at_ms };
        let bytes = serde_json::to_vec(&envelope).map_err(|e| CacheError::Serialization(e.to_string()))?;
        tokio::fs::write(self.path_for(key), bytes).await.map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Backend(e.to_string())),
        }
    }

    async fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::Backend(e.to_string())),
        };
        let mut matching = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| CacheError::Backend(e.to_string()))? {
            if let Some(envelope) = Self::read_envelope_if_live(&entry.path()).await? {
                if glob::matches(pattern, &envelope.key) {
                    matching.push(envelope.key);
                }
            }
        }
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
        let _ = namespace;
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Backend(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn expired_entry_is_absent_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.set("k", b"v".to_vec(), Some(Ttl::from_millis(1))).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.path_for("k").exists());
    }

    #[tokio::test]
    async fn delete_is_idempotent_for_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn keys_matches_against_original_key_not_encoded_filename() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.set("users:1:profile", b"a".to_vec(), None).await.unwrap();
        cache.set("users:2:profile", b"b".to_vec(), None).await.unwrap();
        cache.set("sessions:1", b"c".to_vec(), None).await.unwrap();

        let mut matched = cache.keys("users:*:profile").await.unwrap();
        matched.sort();
        assert_eq!(matched, vec!["users:1:profile", "users:2:profile"]);
    }

    #[tokio::test]
    async fn delete_by_pattern_removes_matching_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        cache.set("users:1:profile", b"a".to_vec(), None).await.unwrap();
        cache.set("sessions:1", b"c".to_vec(), None).await.unwrap();

        let removed = cache.delete_by_pattern("users:*:profile").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.get("users:1:profile").await.unwrap(), None);
        assert_eq!(cache.get("sessions:1").await.unwrap(), Some(b"c".to_vec()));
    }
}
