use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical category for a failure, shared across every Djed component.
///
/// Intentionally coarse-grained: used for policy decisions (is this
/// retryable?) and as an observability dimension in logs, independent of the
/// component-specific error enum (`HttpError`, `CacheError`, `QueueError`,
/// ...) that wraps it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Transient failure in a downstream dependency (network, backend I/O).
    ///
    /// Typically retryable.
    Transient,
    /// Caller supplied invalid input or violated a precondition.
    ///
    /// Never retryable without changing the input.
    InvalidInput,
    /// Operation exceeded its configured time limit.
    Timeout,
    /// Operation was intentionally cancelled.
    ///
    /// A control-flow outcome, not necessarily a fault.
    Cancelled,
    /// Downstream is failing fast to protect itself (circuit open, paused
    /// queue, closed resource).
    Unavailable,
    /// Catch-all bucket when no specific category applies.
    Uncategorized,
}

impl ErrorKind {
    /// Whether a failure of this kind is worth retrying without caller
    /// intervention. `InvalidInput` and `Cancelled` never are.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::Timeout)
    }
}

/// Structured payload for a core-level failure.
///
/// This replaces raw string errors with a stable shape that is easy to:
/// - classify (`kind`) for retry/policy decisions,
/// - render (`message`) for user-facing summaries,
/// - enrich (`detail`) with optional low-level diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreError {
    /// Coarse failure category used by policy and observability.
    pub kind: ErrorKind,
    /// Human-readable summary safe to display in normal logs and UIs.
    pub message: String,
    /// Optional diagnostic detail for debugging and deep triage.
    ///
    /// Prefer concise, actionable context. Omit when no extra detail exists.
    pub detail: Option<String>,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn new_with_detail(
        kind: ErrorKind,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: Some(detail.into()),
        }
    }

    /// Adds or replaces the optional diagnostic detail. If called multiple
    /// times the last value wins.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_matches_kind() {
        assert!(ErrorKind::Transient.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::InvalidInput.is_retryable());
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn display_includes_detail_when_present() {
        let err = CoreError::new(ErrorKind::Transient, "connect failed")
            .with_detail("refused by peer");
        assert_eq!(err.to_string(), "Transient: connect failed (refused by peer)");
    }
}
