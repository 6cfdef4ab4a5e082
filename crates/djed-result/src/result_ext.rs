use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Combinators spec §4.1 asks of `Result` beyond what `std::result::Result`
/// already provides via `map`/`and_then`.
///
/// Named to avoid colliding with inherent std methods (`or_else_with` instead
/// of `or_else`, `get_or_else` instead of `unwrap_or_else`, matching spec
/// naming while staying distinguishable at the call site).
pub trait ResultExt<A, E> {
    /// Maps both sides at once.
    fn bimap<A2, E2>(self, on_ok: impl FnOnce(A) -> A2, on_err: impl FnOnce(E) -> E2) -> Result<A2, E2>;

    /// Collapses both sides into one value.
    fn fold<T>(self, on_ok: impl FnOnce(A) -> T, on_err: impl FnOnce(E) -> T) -> T;

    /// Returns the contained value, or `default` on `Err`.
    fn get_or_else(self, default: impl FnOnce(E) -> A) -> A;

    /// Recovers from `Err` by producing a fresh `Result`.
    fn or_else_with<E2>(self, recover: impl FnOnce(E) -> Result<A, E2>) -> Result<A, E2>;
}

impl<A, E> ResultExt<A, E> for Result<A, E> {
    fn bimap<A2, E2>(self, on_ok: impl FnOnce(A) -> A2, on_err: impl FnOnce(E) -> E2) -> Result<A2, E2> {
        match self {
            Ok(a) => Ok(on_ok(a)),
            Err(e) => Err(on_err(e)),
        }
    }

    fn fold<T>(self, on_ok: impl FnOnce(A) -> T, on_err: impl FnOnce(E) -> T) -> T {
        match self {
            Ok(a) => on_ok(a),
            Err(e) => on_err(e),
        }
    }

    fn get_or_else(self, default: impl FnOnce(E) -> A) -> A {
        match self {
            Ok(a) => a,
            Err(e) => default(e),
        }
    }

    fn or_else_with<E2>(self, recover: impl FnOnce(E) -> Result<A, E2>) -> Result<A, E2> {
        match self {
            Ok(a) => Ok(a),
            Err(e) => recover(e),
        }
    }
}

/// Rust has no exceptions, so "fromThrowable" (spec §4.1) is read as the
/// `catch_unwind` boundary: runs `thunk`, converting a panic payload into a
/// caller-supplied error via `on_panic`. Intended for FFI and thread-spawn
/// edges only — ordinary fallible code should return `Result` directly
/// rather than panic.
pub fn from_throwable<A, E>(
    thunk: impl FnOnce() -> A + panic::UnwindSafe,
    on_panic: impl FnOnce(Box<dyn Any + Send>) -> E,
) -> Result<A, E> {
    panic::catch_unwind(AssertUnwindSafe(thunk)).map_err(on_panic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bimap_transforms_each_side_independently() {
        let ok: Result<i32, &str> = Ok(2);
        assert_eq!(ok.bimap(|a| a * 10, |e| e.len()), Ok(20));

        let err: Result<i32, &str> = Err("boom");
        assert_eq!(err.bimap(|a| a * 10, |e| e.len()), Err(4));
    }

    #[test]
    fn fold_collapses_both_sides() {
        let ok: Result<i32, &str> = Ok(2);
        assert_eq!(ok.fold(|a| a, |_| -1), 2);
        let err: Result<i32, &str> = Err("boom");
        assert_eq!(err.fold(|a| a, |_| -1), -1);
    }

    #[test]
    fn from_throwable_captures_panics_as_errors() {
        let result: Result<i32, String> = from_throwable(
            || panic!("kaboom"),
            |payload| {
                payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown panic".to_string())
            },
        );
        assert_eq!(result, Err("kaboom".to_string()));
    }

    #[test]
    fn from_throwable_passes_through_success() {
        let result: Result<i32, String> = from_throwable(|| 2 + 2, |_| "unreachable".to_string());
        assert_eq!(result, Ok(4));
    }
}
