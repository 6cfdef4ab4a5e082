use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::backend::QueueBackend;
use crate::error::QueueError;
use crate::job::{Job, JobStatus};
use crate::status::{JobTransition, derive_next_job_status};

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as u64
}

#[derive(Eq, PartialEq)]
struct HeapEntry {
    priority: i64,
    created_at: u64,
    id: String,
}

impl Ord for HeapEntry {
    /// Higher priority sorts first; within equal priority, the earlier
    /// `created_at` sorts first (spec.md §4.5 ordering rule), which for a
    /// max-heap means reversing the `created_at` comparison.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority).then_with(|| other.created_at.cmp(&self.created_at))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct DelayedEntry {
    id: String,
    ready_at_ms: u64,
}

/// In-process backend (spec.md §4.5): a `BinaryHeap` ordered by
/// `(priority desc, created_at asc)` for waiting jobs, a delayed set
/// checked on every `dequeue`, and a paused latch. Grounded on the pack's
/// `WorkQueue` claim lifecycle, with storage style borrowed from
/// `djed-cache`'s `DashMap`-backed backends.
pub struct MemoryQueueBackend {
    jobs: DashMap<String, Job>,
    waiting: Mutex<BinaryHeap<HeapEntry>>,
    delayed: Mutex<Vec<DelayedEntry>>,
    failed: DashMap<String, ()>,
    paused: AtomicBool,
    closed: AtomicBool,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            waiting: Mutex::new(BinaryHeap::new()),
            delayed: Mutex::new(Vec::new()),
            failed: DashMap::new(),
            paused: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Moves any delayed job whose delay has elapsed into the waiting heap.
    fn promote_due_delayed_jobs(&self) {
        let now = now_ms();
        let mut delayed = self.delayed.lock().expect("delayed mutex poisoned");
        let (due, still_delayed): (Vec<_>, Vec<_>) = delayed.drain(..).partition(|entry| entry.ready_at_ms <= now);
        *delayed = still_delayed;
        drop(delayed);

        let mut waiting = self.waiting.lock().expect("waiting mutex poisoned");
        for entry in due {
            if let Some(mut job) = self.jobs.get_mut(&entry.id) {
                job.status = derive_next_job_status(job.status, JobTransition::DelayElapsed);
                waiting.push(HeapEntry { priority: job.priority, created_at: job.created_at, id: job.id.clone() });
            }
        }
    }

    fn insert_new_job(&self, mut job: Job) {
        job.created_at = now_ms();
        if job.delay_ms > 0 {
            job.status = JobStatus::Delayed;
            let id = job.id.clone();
            let ready_at_ms = job.created_at + job.delay_ms;
            self.jobs.insert(id.clone(), job);
            self.delayed.lock().expect("delayed mutex poisoned").push(DelayedEntry { id, ready_at_ms });
        } else {
            job.status = JobStatus::Waiting;
            let entry = HeapEntry { priority: job.priority, created_at: job.created_at, id: job.id.clone() };
            self.jobs.insert(job.id.clone(), job);
            self.waiting.lock().expect("waiting mutex poisoned").push(entry);
        }
    }
}

impl Default for MemoryQueueBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    async fn add(&self, job: Job) -> Result<(), QueueError> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(QueueError::QueueClosed);
        }
        self.insert_new_job(job);
        Ok(())
    }

    async fn add_bulk(&self, jobs: Vec<Job>) -> Result<(), QueueError> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(QueueError::QueueClosed);
        }
        for job in jobs {
            self.insert_new_job(job);
        }
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Job>, QueueError> {
        if self.closed.load(AtomicOrdering::SeqCst) {
            return Err(QueueError::QueueClosed);
        }
        if self.paused.load(AtomicOrdering::SeqCst) {
            return Ok(None);
        }
        self.promote_due_delayed_jobs();

        let next_id = self.waiting.lock().expect("waiting mutex poisoned").pop().map(|entry| entry.id);
        let Some(id) = next_id else { return Ok(None) };

        let mut job = self.jobs.get_mut(&id).ok_or_else(|| QueueError::JobNotFound(id.clone()))?;
        job.status = derive_next_job_status(job.status, JobTransition::Acquire);
        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: &str, _result: serde_json::Value) -> Result<(), QueueError> {
        let mut job = self.jobs.get_mut(id).ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        job.status = derive_next_job_status(job.status, JobTransition::Succeed);
        let remove_on_complete = job.options.remove_on_complete;
        drop(job);
        if remove_on_complete {
            self.jobs.remove(id);
        }
        Ok(())
    }

    async fn fail(&self, id: &str, error: String) -> Result<Job, QueueError> {
        let mut job = self.jobs.get_mut(id).ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        let attempt_n = job.attempts_made() + 1;
        job.attempts.push(crate::job::JobAttempt { n: attempt_n, timestamp: now_ms(), error: Some(error) });

        if job.has_attempts_remaining() {
            job.status = derive_next_job_status(job.status, JobTransition::FailRetry);
            let delay = job.options.backoff.delay_for_attempt(attempt_n);
            let id = job.id.clone();
            let priority = job.priority;
            drop(job);
            self.delayed.lock().expect("delayed mutex poisoned").push(DelayedEntry { id, ready_at_ms: now_ms() + delay.as_millis() as u64 });
            let _ = priority;
        } else {
            job.status = derive_next_job_status(job.status, JobTransition::FailExhausted);
            let remove_on_fail = job.options.remove_on_fail;
            let id = job.id.clone();
            drop(job);
            self.failed.insert(id.clone(), ());
            if remove_on_fail {
                self.jobs.remove(&id);
            }
        }

        self.jobs.get(id).map(|entry| entry.clone()).ok_or_else(|| QueueError::JobNotFound(id.to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<Job>, QueueError> {
        Ok(self.jobs.get(id).map(|entry| entry.clone()))
    }

    async fn get_failed_jobs(&self) -> Result<Vec<Job>, QueueError> {
        Ok(self.failed.iter().filter_map(|entry| self.jobs.get(entry.key()).map(|job| job.clone())).collect())
    }

    async fn retry_failed(&self, id: &str) -> Result<(), QueueError> {
        if self.failed.remove(id).is_none() {
            return Err(QueueError::JobNotFound(id.to_string()));
        }
        let mut job = self.jobs.get_mut(id).ok_or_else(|| QueueError::JobNotFound(id.to_string()))?;
        job.status = JobStatus::Waiting;
        let entry = HeapEntry { priority: job.priority, created_at: job.created_at, id: job.id.clone() };
        drop(job);
        self.waiting.lock().expect("waiting mutex poisoned").push(entry);
        Ok(())
    }

    async fn clean(&self, grace: Duration, status: Option<JobStatus>) -> Result<u64, QueueError> {
        let cutoff = now_ms().saturating_sub(grace.as_millis() as u64);
        let terminal: Vec<String> = self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                let is_terminal = matches!(job.status, JobStatus::Completed | JobStatus::Failed);
                let matches_status = status.map(|s| job.status == s).unwrap_or(true);
                is_terminal && matches_status && job.created_at <= cutoff
            })
            .map(|entry| entry.key().clone())
            .collect();
        for id in &terminal {
            self.jobs.remove(id);
            self.failed.remove(id);
        }
        Ok(terminal.len() as u64)
    }

    async fn pause(&self) -> Result<(), QueueError> {
        self.paused.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn resume(&self) -> Result<(), QueueError> {
        self.paused.store(false, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn is_paused(&self) -> Result<bool, QueueError> {
        Ok(self.paused.load(AtomicOrdering::SeqCst))
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }

    async fn is_closed(&self) -> Result<bool, QueueError> {
        Ok(self.closed.load(AtomicOrdering::SeqCst))
    }
}
