use async_trait::async_trait;

use crate::error::CacheError;
use crate::ttl::Ttl;

/// Key/value store abstraction over memory/Redis/file backends (spec.md
/// §4.4). Implementors own their own [`crate::stampede::StampedeGuard`] and
/// expose `get_or_set` as an inherent method rather than a trait method,
/// since stampede prevention needs per-instance state a trait method alone
/// can't carry.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Ttl>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn has(&self, key: &str) -> Result<bool, CacheError>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
    async fn delete_by_pattern(&self, pattern: &str) -> Result<u64, CacheError>;
    async fn clear(&self, namespace: &str) -> Result<(), CacheError>;
}
