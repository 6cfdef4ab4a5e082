use std::time::Duration;

use serde::{Deserialize, Serialize};

use djed_effect::{BackoffKind, RetryPolicy};

/// A job's position in the lifecycle (spec.md §3/§4.5). `Paused` is carried
/// even though no transition in §4.5's diagram produces it on a job
/// directly — it mirrors the data model's literal status list, with the
/// pause latch itself living on the queue/backend (§3 "Queue").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
    Paused,
}

/// One recorded attempt (spec.md §6's round-trip field list:
/// `attempts[]{n, timestamp, error?{message}}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttempt {
    pub n: u32,
    /// Epoch-milliseconds UTC (spec.md §6).
    pub timestamp: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffType {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffSpec {
    #[serde(rename = "type")]
    pub kind: BackoffType,
    pub delay_ms: u64,
}

impl BackoffSpec {
    pub fn fixed(delay_ms: u64) -> Self {
        Self { kind: BackoffType::Fixed, delay_ms }
    }

    pub fn exponential(delay_ms: u64) -> Self {
        Self { kind: BackoffType::Exponential, delay_ms }
    }

    /// Delay before the attempt numbered `attempt` (1-based), reusing the
    /// exact formula `djed-effect::backoff::RetryPolicy` shares with
    /// `djed-http`'s retry policy (spec.md §4.3's formula, applied here to
    /// job retries per SPEC_FULL.md).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let policy = RetryPolicy {
            attempts: u32::MAX,
            backoff: match self.kind {
                BackoffType::Fixed => BackoffKind::Fixed,
                BackoffType::Exponential => BackoffKind::Exponential,
            },
            base_delay: Duration::from_millis(self.delay_ms),
            jitter: None,
            max_delay: None,
        };
        policy.delay_for_attempt(attempt)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    /// Max total attempts, including the first (spec.md §3).
    pub attempts: u32,
    pub timeout: Option<Duration>,
    pub backoff: BackoffSpec,
    pub remove_on_complete: bool,
    pub remove_on_fail: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: 1,
            timeout: None,
            backoff: BackoffSpec::fixed(0),
            remove_on_complete: false,
            remove_on_fail: false,
        }
    }
}

/// A unit of queued work (spec.md §3). `payload` is opaque to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub payload: serde_json::Value,
    /// Higher runs first.
    pub priority: i64,
    pub delay_ms: u64,
    pub status: JobStatus,
    pub attempts: Vec<JobAttempt>,
    pub options: JobOptions,
    /// Epoch-milliseconds UTC, used for FIFO-within-priority ordering.
    pub created_at: u64,
}

impl Job {
    pub fn new(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            payload,
            priority: 0,
            delay_ms: 0,
            status: JobStatus::Waiting,
            attempts: Vec::new(),
            options: JobOptions::default(),
            created_at: 0,
        }
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn has_attempts_remaining(&self) -> bool {
        self.attempts_made() < self.options.attempts
    }
}
