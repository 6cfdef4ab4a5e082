use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::HttpError;

/// Per-endpoint circuit state (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures in `Closed` before tripping to `Open`.
    pub failure_threshold: u32,
    /// How long an `Open` breaker stays open before allowing a trial call.
    pub open_duration: Duration,
    /// Concurrent trial calls permitted while `HalfOpen`.
    pub half_open_max_calls: u32,
    /// Consecutive successful trials in `HalfOpen` required before
    /// transitioning back to `Closed` (spec.md §3/§4.3's `S`).
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            half_open_max_calls: 1,
            success_threshold: 1,
        }
    }
}

struct BreakerEntry {
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    opened_at_millis: AtomicU64,
    half_open_in_flight: AtomicU32,
    state: std::sync::Mutex<BreakerState>,
}

impl BreakerEntry {
    fn new() -> Self {
        Self {
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            opened_at_millis: AtomicU64::new(0),
            half_open_in_flight: AtomicU32::new(0),
            state: std::sync::Mutex::new(BreakerState::Closed),
        }
    }
}

/// Tracks `Closed`/`Open`/`HalfOpen` state per endpoint key, owned by one
/// [`crate::client::HttpClient`] instance (never a module-level global, per
/// spec.md §9 so tests and multiple clients don't share state).
pub struct CircuitBreaker {
    config: BreakerConfig,
    entries: DashMap<String, BreakerEntry>,
    started_at: Instant,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            started_at: Instant::now(),
        }
    }

    fn now_millis(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    pub fn state(&self, endpoint_key: &str) -> BreakerState {
        self.entries
            .get(endpoint_key)
            .map(|e| *e.state.lock().expect("breaker mutex poisoned"))
            .unwrap_or(BreakerState::Closed)
    }

    /// Call before issuing a request. Returns `Err(CircuitOpen)` if the
    /// breaker is open and hasn't yet reached `open_duration`, or if it's
    /// `HalfOpen` and already has `half_open_max_calls` trials in flight.
    /// Transitions `Open` -> `HalfOpen` as a side effect once the cooldown
    /// elapses, in which case `Ok(Some(HalfOpen))` reports the transition.
    pub fn before_call(&self, endpoint_key: &str) -> Result<Option<BreakerState>, HttpError> {
        let entry = self.entries.entry(endpoint_key.to_string()).or_insert_with(BreakerEntry::new);
        let mut state = entry.state.lock().expect("breaker mutex poisoned");
        match *state {
            BreakerState::Closed => Ok(None),
            BreakerState::Open => {
                let opened_at = entry.opened_at_millis.load(Ordering::SeqCst);
                let elapsed = Duration::from_millis(self.now_millis().saturating_sub(opened_at));
                if elapsed >= self.config.open_duration {
                    *state = BreakerState::HalfOpen;
                    entry.half_open_in_flight.store(1, Ordering::SeqCst);
                    entry.consecutive_successes.store(0, Ordering::SeqCst);
                    tracing::info!(endpoint = endpoint_key, "circuit breaker half-open trial");
                    Ok(Some(BreakerState::HalfOpen))
                } else {
                    Err(HttpError::CircuitOpen { endpoint_key: endpoint_key.to_string() })
                }
            }
            BreakerState::HalfOpen => {
                let in_flight = entry.half_open_in_flight.fetch_add(1, Ordering::SeqCst);
                if in_flight < self.config.half_open_max_calls {
                    Ok(None)
                } else {
                    entry.half_open_in_flight.fetch_sub(1, Ordering::SeqCst);
                    Err(HttpError::CircuitOpen { endpoint_key: endpoint_key.to_string() })
                }
            }
        }
    }

    /// Records a successful call. In `HalfOpen`, only transitions back to
    /// `Closed` once `success_threshold` consecutive trials have succeeded
    /// (spec.md §4.3); returns `Some(Closed)` when that transition happens.
    pub fn record_success(&self, endpoint_key: &str) -> Option<BreakerState> {
        let entry = self.entries.get(endpoint_key)?;
        let mut state = entry.state.lock().expect("breaker mutex poisoned");
        entry.consecutive_failures.store(0, Ordering::SeqCst);
        match *state {
            BreakerState::Closed => None,
            BreakerState::HalfOpen => {
                let successes = entry.consecutive_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    *state = BreakerState::Closed;
                    entry.half_open_in_flight.store(0, Ordering::SeqCst);
                    entry.consecutive_successes.store(0, Ordering::SeqCst);
                    tracing::info!(endpoint = endpoint_key, "circuit breaker closed after successful trials");
                    Some(BreakerState::Closed)
                } else {
                    None
                }
            }
            BreakerState::Open => None,
        }
    }

    /// Records a failed call, returning `Some(Open)` when this failure
    /// trips (or re-trips) the breaker.
    pub fn record_failure(&self, endpoint_key: &str) -> Option<BreakerState> {
        let entry = self.entries.entry(endpoint_key.to_string()).or_insert_with(BreakerEntry::new);
        let mut state = entry.state.lock().expect("breaker mutex poisoned");
        match *state {
            BreakerState::Closed => {
                let failures = entry.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    *state = BreakerState::Open;
                    entry.opened_at_millis.store(self.now_millis(), Ordering::SeqCst);
                    tracing::warn!(endpoint = endpoint_key, failures, "circuit breaker opened");
                    Some(BreakerState::Open)
                } else {
                    None
                }
            }
            BreakerState::HalfOpen => {
                *state = BreakerState::Open;
                entry.opened_at_millis.store(self.now_millis(), Ordering::SeqCst);
                entry.half_open_in_flight.store(0, Ordering::SeqCst);
                entry.consecutive_successes.store(0, Ordering::SeqCst);
                tracing::warn!(endpoint = endpoint_key, "circuit breaker reopened after failed trial");
                Some(BreakerState::Open)
            }
            BreakerState::Open => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new(BreakerConfig { failure_threshold: 3, ..Default::default() });
        for _ in 0..3 {
            breaker.before_call("GET /x").unwrap();
            breaker.record_failure("GET /x");
        }
        assert_eq!(breaker.state("GET /x"), BreakerState::Open);
        assert!(breaker.before_call("GET /x").is_err());
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_millis(0),
            half_open_max_calls: 1,
            success_threshold: 1,
        });
        breaker.before_call("GET /x").unwrap();
        breaker.record_failure("GET /x");
        assert_eq!(breaker.state("GET /x"), BreakerState::Open);

        breaker.before_call("GET /x").unwrap();
        assert_eq!(breaker.state("GET /x"), BreakerState::HalfOpen);
        breaker.record_success("GET /x");
        assert_eq!(breaker.state("GET /x"), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_breaker() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_millis(0),
            half_open_max_calls: 1,
            success_threshold: 1,
        });
        breaker.before_call("GET /x").unwrap();
        breaker.record_failure("GET /x");
        breaker.before_call("GET /x").unwrap();
        breaker.record_failure("GET /x");
        assert_eq!(breaker.state("GET /x"), BreakerState::Open);
    }

    #[test]
    fn half_open_requires_success_threshold_consecutive_successes() {
        let breaker = CircuitBreaker::new(BreakerConfig {
            failure_threshold: 1,
            open_duration: Duration::from_millis(0),
            half_open_max_calls: 1,
            success_threshold: 2,
        });
        breaker.before_call("GET /x").unwrap();
        breaker.record_failure("GET /x");

        breaker.before_call("GET /x").unwrap();
        assert_eq!(breaker.record_success("GET /x"), None);
        assert_eq!(breaker.state("GET /x"), BreakerState::HalfOpen);

        breaker.before_call("GET /x").unwrap();
        assert_eq!(breaker.record_success("GET /x"), Some(BreakerState::Closed));
        assert_eq!(breaker.state("GET /x"), BreakerState::Closed);
    }
}
