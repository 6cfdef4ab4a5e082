pub mod cache;
pub mod error;
pub mod file;
pub mod glob;
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis_backend;
pub mod stampede;
pub mod ttl;

pub use cache::Cache;
pub use error::CacheError;
pub use file::FileCache;
pub use memory::MemoryCache;
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisCache;
pub use stampede::StampedeGuard;
pub use ttl::Ttl;
