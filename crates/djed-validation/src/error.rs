use djed_result::{FieldError, NonEmptyErrors};

/// The error side of every [`crate::Validator`]: one or more field-level
/// violations, never zero (mirrors spec.md's "validation never reports
/// success with an empty error list").
pub type ValidationError = NonEmptyErrors<FieldError>;

/// Builds a single-violation [`ValidationError`] at `path`.
pub fn violation(path: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> ValidationError {
    NonEmptyErrors::single(FieldError::new(path, code, message))
}
