use thiserror::Error;

use djed_result::Semigroup;

/// Failure kinds for a cache operation (spec.md §7). `NotFound` is
/// deliberately absent — a miss is `Ok(None)`, never an error.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Semigroup for CacheError {
    /// The first failure wins; a single cache operation has one outcome.
    fn combine(self, _other: Self) -> Self {
        self
    }
}
