use thiserror::Error;

use djed_result::Semigroup;

/// Failure kinds for a request, matching spec.md §4.3/§7 verbatim.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("non-2xx response: {status}")]
    Non2xx { status: u16, body: String },
    #[error("circuit open for endpoint '{endpoint_key}'")]
    CircuitOpen { endpoint_key: String },
    #[error("request cancelled")]
    Cancelled,
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl HttpError {
    /// Whether a retry loop should attempt this request again (spec.md
    /// §4.3 step 5: 5xx and the `408`/`425`/`429` 4xx exceptions are
    /// retryable; every other 4xx is a non-retryable failure).
    /// `CircuitOpen` is deliberately excluded — retrying into an open
    /// breaker defeats its purpose.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Network(_) | HttpError::Timeout => true,
            HttpError::Non2xx { status, .. } => matches!(status, 408 | 425 | 429) || *status >= 500,
            HttpError::CircuitOpen { .. } | HttpError::Cancelled | HttpError::Serialization(_) => false,
        }
    }
}

impl Semigroup for HttpError {
    /// The first failure wins; there is exactly one request outcome to
    /// report, unlike the multi-field accumulation `djed-validation` does.
    fn combine(self, _other: Self) -> Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_4xx_is_not_retryable() {
        let error = HttpError::Non2xx { status: 400, body: String::new() };
        assert!(!error.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let error = HttpError::Non2xx { status: 503, body: String::new() };
        assert!(error.is_retryable());
    }

    #[test]
    fn rate_limit_and_timeout_status_codes_are_retryable() {
        for status in [408, 425, 429] {
            assert!(HttpError::Non2xx { status, body: String::new() }.is_retryable());
        }
    }

    #[test]
    fn circuit_open_is_never_retryable() {
        let error = HttpError::CircuitOpen { endpoint_key: "GET /x".to_string() };
        assert!(!error.is_retryable());
    }
}
