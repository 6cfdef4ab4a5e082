#![cfg(feature = "redis-backend")]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::backend::QueueBackend;
use crate::error::QueueError;
use crate::job::{Job, JobAttempt, JobStatus};
use crate::status::{JobTransition, derive_next_job_status};

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as u64
}

/// Orders a sorted-set entry by priority descending, then creation time
/// ascending (spec.md §4.5), within a single `f64` score: priority
/// dominates the magnitude, `created_at` breaks ties among equal
/// priorities, and `ZRANGEBYSCORE`'s ascending order does the rest.
fn priority_score(priority: i64, created_at: u64) -> f64 {
    -(priority as f64) * 1e15 + created_at as f64
}

fn backend_err(error: redis::RedisError) -> QueueError {
    QueueError::ConnectionError(error.to_string())
}

/// Redis-backed queue (spec.md §4.5, §9 "Backend polymorphism"). Mirrors
/// `djed-cache::RedisCache`'s `ConnectionManager` + key-prefix approach;
/// job payloads live in a hash, ordering lives in sorted sets, and the DLQ
/// is a plain set.
pub struct RedisQueueBackend {
    connection: ConnectionManager,
    prefix: String,
}

impl RedisQueueBackend {
    pub async fn connect(url: &str, queue_name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(backend_err)?;
        let connection = ConnectionManager::new(client).await.map_err(backend_err)?;
        Ok(Self { connection, prefix: format!("djed:queue:{queue_name}") })
    }

    fn jobs_key(&self) -> String {
        format!("{}:jobs", self.prefix)
    }
    fn waiting_key(&self) -> String {
        format!("{}:waiting", self.prefix)
    }
    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.prefix)
    }
    fn failed_key(&self) -> String {
        format!("{}:failed", self.prefix)
    }
    fn paused_key(&self) -> String {
        format!("{}:paused", self.prefix)
    }
    fn closed_key(&self) -> String {
        format!("{}:closed", self.prefix)
    }

    async fn store_job(&self, job: &Job) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(job).map_err(|e| QueueError::OperationFailed { message: e.to_string(), cause: None })?;
        let _: () = conn.hset(self.jobs_key(), &job.id, json).await.map_err(backend_err)?;
        Ok(())
    }

    async fn load_job(&self, id: &str) -> Result<Option<Job>, QueueError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.hget(self.jobs_key(), id).await.map_err(backend_err)?;
        match raw {
            Some(json) => {
                let job = serde_json::from_str(&json).map_err(|e| QueueError::OperationFailed { message: e.to_string(), cause: None })?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    async fn flag_is_set(&self, key: String) -> Result<bool, QueueError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await.map_err(backend_err)?;
        Ok(value.as_deref() == Some("1"))
    }

    async fn promote_due_delayed_jobs(&self) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        let now = now_ms() as f64;
        let due: Vec<String> = conn.zrangebyscore(self.delayed_key(), f64::MIN, now).await.map_err(backend_err)?;
        for id in due {
            if let Some(mut job) = self.load_job(&id).await? {
                job.status = derive_next_job_status(job.status, JobTransition::DelayElapsed);
                let score = priority_score(job.priority, job.created_at);
                self.store_job(&job).await?;
                let _: () = conn.zrem(self.delayed_key(), &id).await.map_err(backend_err)?;
                let _: () = conn.zadd(self.waiting_key(), &id, score).await.map_err(backend_err)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl QueueBackend for RedisQueueBackend {
    async fn add(&self, mut job: Job) -> Result<(), QueueError> {
        if self.is_closed().await? {
            return Err(QueueError::QueueClosed);
        }
        job.created_at = now_ms();
        let mut conn = self.connection.clone();
        if job.delay_ms > 0 {
            job.status = JobStatus::Delayed;
            let ready_at = (job.created_at + job.delay_ms) as f64;
            self.store_job(&job).await?;
            let _: () = conn.zadd(self.delayed_key(), &job.id, ready_at).await.map_err(backend_err)?;
        } else {
            job.status = JobStatus::Waiting;
            let score = priority_score(job.priority, job.created_at);
            self.store_job(&job).await?;
            let _: () = conn.zadd(self.waiting_key(), &job.id, score).await.map_err(backend_err)?;
        }
        Ok(())
    }

    async fn add_bulk(&self, jobs: Vec<Job>) -> Result<(), QueueError> {
        for job in jobs {
            self.add(job).await?;
        }
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Job>, QueueError> {
        if self.is_closed().await? {
            return Err(QueueError::QueueClosed);
        }
        if self.is_paused().await? {
            return Ok(None);
        }
        self.promote_due_delayed_jobs().await?;

        let mut conn = self.connection.clone();
        let popped: Vec<(String, f64)> = conn.zpopmin(self.waiting_key(), 1).await.map_err(backend_err)?;
        let Some((id, _score)) = popped.into_iter().next() else { return Ok(None) };

        let mut job = self.load_job(&id).await?.ok_or_else(|| QueueError::JobNotFound(id.clone()))?;
        job.status = derive_next_job_status(job.status, JobTransition::Acquire);
        self.store_job(&job).await?;
        Ok(Some(job))
    }

    async fn complete(&self, id: &str, _result: serde_json::Value) -> Result<(), QueueError> {
        let mut job = self.load_job(id).await?.ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        job.status = derive_next_job_status(job.status, JobTransition::Succeed);
        if job.options.remove_on_complete {
            let mut conn = self.connection.clone();
            let _: () = conn.hdel(self.jobs_key(), id).await.map_err(backend_err)?;
        } else {
            self.store_job(&job).await?;
        }
        Ok(())
    }

    async fn fail(&self, id: &str, error: String) -> Result<Job, QueueError> {
        let mut job = self.load_job(id).await?.ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        let attempt_n = job.attempts_made() + 1;
        job.attempts.push(JobAttempt { n: attempt_n, timestamp: now_ms(), error: Some(error) });

        let mut conn = self.connection.clone();
        if job.has_attempts_remaining() {
            job.status = derive_next_job_status(job.status, JobTransition::FailRetry);
            let delay = job.options.backoff.delay_for_attempt(attempt_n);
            let ready_at = (now_ms() + delay.as_millis() as u64) as f64;
            self.store_job(&job).await?;
            let _: () = conn.zadd(self.delayed_key(), id, ready_at).await.map_err(backend_err)?;
        } else {
            job.status = derive_next_job_status(job.status, JobTransition::FailExhausted);
            if job.options.remove_on_fail {
                let _: () = conn.hdel(self.jobs_key(), id).await.map_err(backend_err)?;
            } else {
                self.store_job(&job).await?;
            }
            let _: () = conn.sadd(self.failed_key(), id).await.map_err(backend_err)?;
        }
        Ok(job)
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, QueueError> {
        self.load_job(id).await
    }

    async fn get_failed_jobs(&self) -> Result<Vec<Job>, QueueError> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn.smembers(self.failed_key()).await.map_err(backend_err)?;
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(job) = self.load_job(&id).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    async fn retry_failed(&self, id: &str) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.srem(self.failed_key(), id).await.map_err(backend_err)?;
        if removed == 0 {
            return Err(QueueError::JobNotFound(id.to_string()));
        }
        let mut job = self.load_job(id).await?.ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        job.status = JobStatus::Waiting;
        let score = priority_score(job.priority, job.created_at);
        self.store_job(&job).await?;
        let _: () = conn.zadd(self.waiting_key(), id, score).await.map_err(backend_err)?;
        Ok(())
    }

    async fn clean(&self, grace: Duration, status: Option<JobStatus>) -> Result<u64, QueueError> {
        let mut conn = self.connection.clone();
        let cutoff = now_ms().saturating_sub(grace.as_millis() as u64);
        let all: std::collections::HashMap<String, String> = conn.hgetall(self.jobs_key()).await.map_err(backend_err)?;
        let mut removed = 0u64;
        for (id, json) in all {
            let Ok(job) = serde_json::from_str::<Job>(&json) else { continue };
            let is_terminal = matches!(job.status, JobStatus::Completed | JobStatus::Failed);
            let matches_status = status.map(|s| job.status == s).unwrap_or(true);
            if is_terminal && matches_status && job.created_at <= cutoff {
                let _: () = conn.hdel(self.jobs_key(), &id).await.map_err(backend_err)?;
                let _: () = conn.srem(self.failed_key(), &id).await.map_err(backend_err)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn pause(&self) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        conn.set(self.paused_key(), "1").await.map_err(backend_err)
    }

    async fn resume(&self) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        conn.set(self.paused_key(), "0").await.map_err(backend_err)
    }

    async fn is_paused(&self) -> Result<bool, QueueError> {
        self.flag_is_set(self.paused_key()).await
    }

    async fn close(&self) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        conn.set(self.closed_key(), "1").await.map_err(backend_err)
    }

    async fn is_closed(&self) -> Result<bool, QueueError> {
        self.flag_is_set(self.closed_key()).await
    }
}
