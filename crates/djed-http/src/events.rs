use crate::breaker::BreakerState;

/// Observability hook for a request's lifecycle (spec.md §4.3, §6). Out of
/// scope per spec.md §1 is any consumer of these events — only the producer
/// contract lives here.
#[derive(Debug, Clone)]
pub enum HttpEvent {
    AttemptStarted { endpoint_key: String, attempt: u32 },
    AttemptSucceeded { endpoint_key: String, attempt: u32, status: u16, duration_ms: u64 },
    AttemptFailed { endpoint_key: String, attempt: u32, error: String, duration_ms: u64 },
    BreakerTransitioned { endpoint_key: String, to: BreakerState },
}
