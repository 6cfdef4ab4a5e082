use std::time::Duration;

/// Shared backoff formula (spec §4.3): `delay(n) = min(maxDelay, base *
/// 2^(n-1)) + uniform(0, jitter)`. Used by `Effect::retry` and reused
/// unchanged by `djed-http`'s `RetryPolicy` and `djed-queue`'s job backoff so
/// all three components compute attempt delays identically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Maximum total attempts, including the first.
    pub attempts: u32,
    pub backoff: BackoffKind,
    pub base_delay: Duration,
    pub jitter: Option<Duration>,
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    pub fn fixed(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            backoff: BackoffKind::Fixed,
            base_delay,
            jitter: None,
            max_delay: None,
        }
    }

    pub fn exponential(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts,
            backoff: BackoffKind::Exponential,
            base_delay,
            jitter: None,
            max_delay: None,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Delay to wait before attempt `attempt` (1-based: the first retry is
    /// `attempt == 1`). Deterministic modulo jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = match self.backoff {
            BackoffKind::Fixed => self.base_delay,
            BackoffKind::Exponential => {
                let exponent = attempt.saturating_sub(1);
                let scaled = (self.base_delay.as_millis()).saturating_mul(1u128 << exponent.min(62));
                Duration::from_millis(scaled.min(u128::from(u64::MAX)) as u64)
            }
        };
        let capped = match self.max_delay {
            Some(max) if base > max => max,
            _ => base,
        };
        match self.jitter {
            Some(jitter) if jitter > Duration::ZERO => {
                let jitter_ms = jitter.as_millis().max(1) as u64;
                capped + Duration::from_millis(rand::random::<u64>() % jitter_ms)
            }
            _ => capped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_is_constant() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(10));
    }

    #[test]
    fn exponential_backoff_doubles_each_attempt() {
        let policy = RetryPolicy::exponential(5, Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(40));
    }

    #[test]
    fn exponential_backoff_respects_max_delay() {
        let policy = RetryPolicy::exponential(10, Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(25));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(25));
    }

    #[test]
    fn jitter_never_exceeds_base_plus_jitter_bound() {
        let policy = RetryPolicy::fixed(5, Duration::from_millis(10)).with_jitter(Duration::from_millis(5));
        for attempt in 1..5 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay >= Duration::from_millis(10));
            assert!(delay < Duration::from_millis(15));
        }
    }
}
