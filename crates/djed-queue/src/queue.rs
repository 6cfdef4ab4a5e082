use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::backend::QueueBackend;
use crate::error::QueueError;
use crate::events::QueueEvent;
use crate::job::{Job, JobStatus};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Named front door onto a [`QueueBackend`] (spec.md §4.5 "Queue"): wraps
/// backend calls with event emission so producers and the dashboard/worker
/// side see the same lifecycle notifications regardless of backend.
pub struct Queue<B: QueueBackend> {
    name: String,
    backend: Arc<B>,
    events: broadcast::Sender<QueueEvent>,
}

impl<B: QueueBackend> Queue<B> {
    pub fn new(name: impl Into<String>, backend: Arc<B>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { name: name.into(), backend, events }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Emitting events is best-effort: a lagging/absent subscriber must
    /// never affect queue progress (spec.md §4.5). Visible to `Worker`,
    /// which needs finer-grained event timing than the wrapper methods
    /// below provide (e.g. `JobActive` fires before the handler runs).
    pub(crate) fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }

    /// Surfaces a backend failure as a `queue:error` event (spec.md line
    /// 143) in addition to the `Result` the caller already gets — a
    /// subscriber watching the event stream alone must still see it.
    fn emit_backend_error(&self, error: &QueueError) {
        self.emit(QueueEvent::QueueError { message: error.to_string() });
    }

    pub async fn add(&self, job: Job) -> Result<(), QueueError> {
        let id = job.id.clone();
        self.backend.add(job).await.inspect_err(|error| self.emit_backend_error(error))?;
        self.emit(QueueEvent::JobAdded { id });
        Ok(())
    }

    pub async fn add_bulk(&self, jobs: Vec<Job>) -> Result<(), QueueError> {
        let ids: Vec<String> = jobs.iter().map(|job| job.id.clone()).collect();
        self.backend.add_bulk(jobs).await.inspect_err(|error| self.emit_backend_error(error))?;
        for id in ids {
            self.emit(QueueEvent::JobAdded { id });
        }
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Job>, QueueError> {
        self.backend.get(id).await.inspect_err(|error| self.emit_backend_error(error))
    }

    pub async fn get_failed_jobs(&self) -> Result<Vec<Job>, QueueError> {
        self.backend.get_failed_jobs().await.inspect_err(|error| self.emit_backend_error(error))
    }

    pub async fn retry_failed(&self, id: &str) -> Result<(), QueueError> {
        self.backend.retry_failed(id).await.inspect_err(|error| self.emit_backend_error(error))?;
        self.emit(QueueEvent::JobAdded { id: id.to_string() });
        Ok(())
    }

    pub async fn clean(&self, grace: Duration, status: Option<JobStatus>) -> Result<u64, QueueError> {
        self.backend.clean(grace, status).await.inspect_err(|error| self.emit_backend_error(error))
    }

    pub async fn pause(&self) -> Result<(), QueueError> {
        self.backend.pause().await.inspect_err(|error| self.emit_backend_error(error))?;
        self.emit(QueueEvent::QueuePaused);
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), QueueError> {
        self.backend.resume().await.inspect_err(|error| self.emit_backend_error(error))?;
        self.emit(QueueEvent::QueueResumed);
        Ok(())
    }

    pub async fn is_paused(&self) -> Result<bool, QueueError> {
        self.backend.is_paused().await.inspect_err(|error| self.emit_backend_error(error))
    }

    pub async fn close(&self) -> Result<(), QueueError> {
        self.backend.close().await.inspect_err(|error| self.emit_backend_error(error))?;
        self.emit(QueueEvent::QueueDrained);
        Ok(())
    }

    pub async fn is_closed(&self) -> Result<bool, QueueError> {
        self.backend.is_closed().await.inspect_err(|error| self.emit_backend_error(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_backend::MemoryQueueBackend;

    #[tokio::test]
    async fn add_emits_job_added_event() {
        let queue = Queue::new("emails", Arc::new(MemoryQueueBackend::new()));
        let mut events = queue.subscribe_events();
        queue.add(Job::new("a", serde_json::json!({}))).await.unwrap();
        let event = events.recv().await.unwrap();
        assert!(matches!(event, QueueEvent::JobAdded { id } if id == "a"));
    }

    #[tokio::test]
    async fn close_after_add_rejects_further_work() {
        let queue = Queue::new("emails", Arc::new(MemoryQueueBackend::new()));
        queue.close().await.unwrap();
        let result = queue.add(Job::new("a", serde_json::json!({}))).await;
        assert!(matches!(result, Err(QueueError::QueueClosed)));
    }

    #[tokio::test]
    async fn backend_error_emits_queue_error_event() {
        let queue = Queue::new("emails", Arc::new(MemoryQueueBackend::new()));
        queue.close().await.unwrap();
        let mut events = queue.subscribe_events();
        let _ = events.recv().await.unwrap(); // QueueDrained from close()

        let result = queue.add(Job::new("a", serde_json::json!({}))).await;
        assert!(result.is_err());
        let event = events.recv().await.unwrap();
        assert!(matches!(event, QueueEvent::QueueError { message } if message.contains("closed")));
    }
}
