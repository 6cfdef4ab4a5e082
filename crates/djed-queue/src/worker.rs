use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use djed_effect::Effect;
use djed_effect::error::EffectError;

use crate::backend::QueueBackend;
use crate::error::QueueError;
use crate::events::QueueEvent;
use crate::job::Job;
use crate::queue::Queue;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub type Handler = Arc<dyn Fn(Job) -> Effect<(), QueueError, serde_json::Value> + Send + Sync>;

/// Pulls jobs off a [`Queue`] and runs them with bounded concurrency
/// (spec.md §4.5 "Worker"). The concurrency gate mirrors
/// `djed-effect::combinators::parallel`'s `Semaphore`-per-slot idiom,
/// adapted to an open-ended poll loop instead of a fixed batch.
pub struct Worker<B: QueueBackend> {
    queue: Arc<Queue<B>>,
    shutdown: CancellationToken,
}

impl<B: QueueBackend + 'static> Worker<B> {
    pub fn new(queue: Arc<Queue<B>>) -> Self {
        Self { queue, shutdown: CancellationToken::new() }
    }

    /// Signals [`Worker::process`] to stop claiming new jobs and return once
    /// in-flight jobs finish.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn process(&self, handler: Handler, concurrency: usize) {
        let slots = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut in_flight = Vec::new();

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.queue.is_closed().await {
                Ok(true) => break,
                Ok(false) => {}
                Err(_) => break,
            }

            match self.queue.backend().dequeue().await {
                Ok(Some(job)) => {
                    let permit = slots.clone().acquire_owned().await.expect("semaphore never closed");
                    let queue = self.queue.clone();
                    let handler = handler.clone();
                    in_flight.push(tokio::spawn(async move {
                        run_one(queue, handler, job).await;
                        drop(permit);
                    }));
                }
                Ok(None) => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(error) => {
                    self.queue.emit(QueueEvent::QueueError { message: error.to_string() });
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
            }
            in_flight.retain(|handle| !handle.is_finished());
        }

        for handle in in_flight {
            let _ = handle.await;
        }
    }
}

async fn run_one<B: QueueBackend>(queue: Arc<Queue<B>>, handler: Handler, job: Job) {
    let id = job.id.clone();
    queue.emit(QueueEvent::JobActive { id: id.clone() });

    let effect = handler(job.clone());
    let outcome = match job.options.timeout {
        Some(duration) => collapse(effect.timeout(duration)).run(()).await,
        None => effect.run(()).await,
    };

    match outcome {
        Ok(result) => match queue.backend().complete(&id, result.clone()).await {
            Ok(()) => queue.emit(QueueEvent::JobCompleted { id, result }),
            Err(error) => queue.emit(QueueEvent::QueueError { message: error.to_string() }),
        },
        Err(error) => {
            let message = error.to_string();
            match queue.backend().fail(&id, message.clone()).await {
                Ok(_) => queue.emit(QueueEvent::JobFailed { id, error: message }),
                Err(error) => queue.emit(QueueEvent::QueueError { message: error.to_string() }),
            }
        }
    }
}

fn collapse<A>(effect: Effect<(), EffectError<QueueError>, A>) -> Effect<(), QueueError, A>
where
    A: Send + 'static,
{
    Effect::new(move |env, token| {
        let effect = effect.clone();
        async move {
            effect.run_with_cancellation(env, token).await.map_err(|error| match error {
                EffectError::Timeout => QueueError::OperationFailed { message: "job timed out".to_string(), cause: None },
                EffectError::Cancelled => QueueError::OperationFailed { message: "job cancelled".to_string(), cause: None },
                EffectError::Failure(inner) => inner,
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobOptions;
    use crate::memory_backend::MemoryQueueBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn successful_job_emits_completed_and_is_removed() {
        let queue = Arc::new(Queue::new("q", Arc::new(MemoryQueueBackend::new())));
        let options = JobOptions { remove_on_complete: true, ..JobOptions::default() };
        queue.add(Job::new("a", serde_json::json!({"n": 1})).options(options)).await.unwrap();

        let worker = Worker::new(queue.clone());
        let handler: Handler = Arc::new(|job: Job| {
            Effect::from_async(move || {
                let payload = job.payload.clone();
                async move { Ok(payload) }
            })
        });

        let worker_clone = queue.clone();
        let handle = tokio::spawn(async move {
            worker.process(handler, 2).await;
            worker_clone
        });
        tokio::time::sleep(Duration::from_millis(60)).await;
        queue.close().await.unwrap();
        let _ = handle.await;

        assert!(queue.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_handler_retries_then_lands_in_dlq() {
        let queue = Arc::new(Queue::new("q", Arc::new(MemoryQueueBackend::new())));
        let options = JobOptions { attempts: 2, ..JobOptions::default() };
        queue.add(Job::new("a", serde_json::json!({})).options(options)).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let handler: Handler = Arc::new(move |_job: Job| {
            let calls = calls_clone.clone();
            Effect::from_async(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(QueueError::JobFailed { message: "boom".to_string(), cause: None }) }
            })
        });

        let worker = Worker::new(queue.clone());
        let queue_for_close = queue.clone();
        let handle = tokio::spawn(async move {
            worker.process(handler, 1).await;
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        queue_for_close.close().await.unwrap();
        let _ = handle.await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let failed = queue_for_close.get_failed_jobs().await.unwrap();
        assert_eq!(failed.len(), 1);
    }
}
