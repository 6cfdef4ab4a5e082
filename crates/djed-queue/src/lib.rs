pub mod backend;
pub mod error;
pub mod events;
pub mod job;
pub mod memory_backend;
#[cfg(feature = "redis-backend")]
pub mod redis_backend;
pub mod queue;
pub mod status;
pub mod worker;

pub use backend::QueueBackend;
pub use error::QueueError;
pub use events::QueueEvent;
pub use job::{BackoffSpec, BackoffType, Job, JobAttempt, JobOptions, JobStatus};
pub use memory_backend::MemoryQueueBackend;
pub use queue::Queue;
#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisQueueBackend;
pub use status::{JobTransition, derive_next_job_status};
pub use worker::{Handler, Worker};
