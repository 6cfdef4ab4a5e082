use djed_result::Semigroup;
use thiserror::Error;

/// The error side every Effect combinator that can introduce a timeout or a
/// cancellation produces. Wraps the caller's own failure type `E` unchanged
/// when the failure came from `E` itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError<E> {
    #[error("effect timed out")]
    Timeout,
    #[error("effect was cancelled")]
    Cancelled,
    #[error(transparent)]
    Failure(#[from] E),
}

impl<E: Semigroup> Semigroup for EffectError<E> {
    /// `Failure` combines with `Failure` via `E`'s own semigroup. A
    /// `Timeout`/`Cancelled` outcome takes precedence over a later outcome,
    /// since it already represents the resolution of the whole operation.
    fn combine(self, other: Self) -> Self {
        match (self, other) {
            (EffectError::Failure(a), EffectError::Failure(b)) => EffectError::Failure(a.combine(b)),
            (first, _) => first,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djed_result::NonEmptyErrors;

    #[test]
    fn combine_merges_two_failures() {
        let a: EffectError<NonEmptyErrors<&str>> = EffectError::Failure(NonEmptyErrors::single("a"));
        let b: EffectError<NonEmptyErrors<&str>> = EffectError::Failure(NonEmptyErrors::single("b"));
        let combined = a.combine(b);
        match combined {
            EffectError::Failure(errs) => assert_eq!(errs.into_vec(), vec!["a", "b"]),
            _ => panic!("expected Failure"),
        }
    }

    #[test]
    fn timeout_takes_precedence_over_later_failure() {
        let timeout: EffectError<NonEmptyErrors<&str>> = EffectError::Timeout;
        let failure: EffectError<NonEmptyErrors<&str>> = EffectError::Failure(NonEmptyErrors::single("a"));
        match timeout.combine(failure) {
            EffectError::Timeout => {}
            _ => panic!("expected Timeout to win"),
        }
    }
}
