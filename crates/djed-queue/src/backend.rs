use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueError;
use crate::job::{Job, JobStatus};

/// Backend-agnostic job store (spec.md §9 "Backend polymorphism"): the core
/// consumes this trait; in-memory and Redis are drop-in implementations.
/// Shaped after the pack's `WorkQueue` claim/complete/fail lifecycle trait,
/// adapted to spec.md §4.5's `dequeue`/`complete`/`fail` naming.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn add(&self, job: Job) -> Result<(), QueueError>;

    /// Semantically equivalent to calling `add` once per element (spec.md
    /// §4.5); backends that support atomic bulk inserts may use one.
    async fn add_bulk(&self, jobs: Vec<Job>) -> Result<(), QueueError>;

    /// Returns the next eligible job and marks it `Active`, or `None` if
    /// nothing is ready (queue empty, paused, or closed).
    async fn dequeue(&self) -> Result<Option<Job>, QueueError>;

    async fn complete(&self, id: &str, result: serde_json::Value) -> Result<(), QueueError>;

    /// Records a failed attempt and routes the job back to `Waiting`
    /// (attempts remain) or `Failed`/DLQ (exhausted). Returns the updated
    /// job so the caller can report its resulting status.
    async fn fail(&self, id: &str, error: String) -> Result<Job, QueueError>;

    async fn get(&self, id: &str) -> Result<Option<Job>, QueueError>;

    async fn get_failed_jobs(&self) -> Result<Vec<Job>, QueueError>;

    /// Returns a job from the DLQ to `Waiting` (spec.md §4.5 DLQ).
    async fn retry_failed(&self, id: &str) -> Result<(), QueueError>;

    /// Removes terminal jobs (`Completed`/`Failed`, or a specific status if
    /// given) older than `grace`. Returns the number removed.
    async fn clean(&self, grace: Duration, status: Option<JobStatus>) -> Result<u64, QueueError>;

    async fn pause(&self) -> Result<(), QueueError>;
    async fn resume(&self) -> Result<(), QueueError>;
    async fn is_paused(&self) -> Result<bool, QueueError>;
    async fn close(&self) -> Result<(), QueueError>;
    async fn is_closed(&self) -> Result<bool, QueueError>;
}
