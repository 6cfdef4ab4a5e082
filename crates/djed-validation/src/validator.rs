use std::sync::Arc;

use djed_result::FieldError;

use crate::error::{violation, ValidationError};

type ValidateFn<I, O> = Arc<dyn Fn(&I) -> Result<O, ValidationError> + Send + Sync>;

/// A composable, error-accumulating check from `I` to `O` (spec.md §4.2).
///
/// Unlike a plain `Fn(&I) -> Result<O, E>`, a `Validator` is built to be
/// combined: [`Validator::and`]/[`Validator::chain`] compose two validators
/// sequentially, while [`FieldAccumulator`] runs a whole set of independent
/// field validators regardless of individual failures and reports every
/// violation found, not just the first.
pub struct Validator<I, O> {
    check: ValidateFn<I, O>,
}

impl<I, O> Clone for Validator<I, O> {
    fn clone(&self) -> Self {
        Self { check: self.check.clone() }
    }
}

impl<I, O> Validator<I, O>
where
    I: 'static,
    O: 'static,
{
    pub fn new(check: impl Fn(&I) -> Result<O, ValidationError> + Send + Sync + 'static) -> Self {
        Self { check: Arc::new(check) }
    }

    pub fn validate(&self, input: &I) -> Result<O, ValidationError> {
        (self.check)(input)
    }

    /// Transforms a successful value, leaving violations untouched.
    pub fn map<O2>(self, f: impl Fn(O) -> O2 + Send + Sync + 'static) -> Validator<I, O2>
    where
        O2: 'static,
    {
        Validator::new(move |input| self.validate(input).map(&f))
    }

    /// Monadic refinement: runs `self`, and only on success runs the
    /// validator `f` produces against the original input. Short-circuits on
    /// the first failure, unlike [`FieldAccumulator`].
    pub fn chain<O2>(self, f: impl Fn(O) -> Result<O2, ValidationError> + Send + Sync + 'static) -> Validator<I, O2>
    where
        O2: 'static,
    {
        Validator::new(move |input| self.validate(input).and_then(&f))
    }

    /// Sequential composition: feeds `self`'s output into `next` as its
    /// input. Fails fast — `next` never runs if `self` fails.
    pub fn and<O2>(self, next: Validator<O, O2>) -> Validator<I, O2>
    where
        O2: 'static,
    {
        Validator::new(move |input| {
            let mid = self.validate(input)?;
            next.validate(&mid)
        })
    }

    /// Prefixes every violation's path with `prefix` (spec.md §4.2's nested
    /// field reporting, e.g. `address.city` under a `struct_of`).
    pub fn at(self, prefix: impl Into<String> + Clone + Send + Sync + 'static) -> Self {
        Validator::new(move |input| {
            self.validate(input).map_err(|errors| {
                let nested: Vec<FieldError> = errors.into_vec().into_iter().map(|e| e.nest(&prefix.clone().into())).collect();
                ValidationError::from_vec(nested).expect("nest preserves non-emptiness")
            })
        })
    }

    /// Lifts this validator over `Option<I>`, treating `None` as success with
    /// no output.
    pub fn optional(self) -> Validator<Option<I>, Option<O>> {
        Validator::new(move |input| match input {
            Some(inner) => self.validate(inner).map(Some),
            None => Ok(None),
        })
    }
}

impl<I, O> Validator<I, O>
where
    I: 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Always succeeds with a clone of `value`, ignoring the input.
    pub fn constant(value: O) -> Self {
        Validator::new(move |_input| Ok(value.clone()))
    }
}

/// Fails with a single violation at `path`.
pub fn fail<I, O>(path: impl Into<String> + Clone + Send + Sync + 'static, code: impl Into<String> + Clone + Send + Sync + 'static, message: impl Into<String> + Clone + Send + Sync + 'static) -> Validator<I, O>
where
    I: 'static,
    O: 'static,
{
    Validator::new(move |_input| Err(violation(path.clone(), code.clone(), message.clone())))
}

/// Runs a whole set of independent field validators against their own slice
/// of an input and accumulates every violation, rather than stopping at the
/// first (spec.md §4.2's applicative `struct_of`). Grounded on the pattern of
/// always applying every check and folding every resulting violation into one
/// batch, regardless of earlier failures in the same pass.
///
/// ```ignore
/// let mut fields = FieldAccumulator::new();
/// let host = fields.field(hostname().validate(&raw.host));
/// let port = fields.field(port().validate(&raw.port));
/// fields.finish(|| Config { host: host.unwrap(), port: port.unwrap() })
/// ```
///
/// `finish`'s closure may safely `unwrap()` every field collected through
/// `field`: `finish` only invokes it once every prior `field` call returned
/// `Some`, which `FieldAccumulator`'s error bookkeeping guarantees.
#[derive(Default)]
pub struct FieldAccumulator {
    errors: Vec<FieldError>,
}

impl FieldAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one field's validation. Returns `Some(value)`
    /// on success; on failure, appends every violation and returns `None`.
    pub fn field<O>(&mut self, result: Result<O, ValidationError>) -> Option<O> {
        match result {
            Ok(value) => Some(value),
            Err(errors) => {
                self.errors.extend(errors);
                None
            }
        }
    }

    /// Same as [`FieldAccumulator::field`] but nests every violation's path
    /// under `name`.
    pub fn nested_field<O>(&mut self, name: &str, result: Result<O, ValidationError>) -> Option<O> {
        match result {
            Ok(value) => Some(value),
            Err(errors) => {
                self.errors.extend(errors.into_vec().into_iter().map(|e| e.nest(name)));
                None
            }
        }
    }

    /// Finishes the batch: if any field failed, returns the combined
    /// violations; otherwise builds `T` from the already-validated fields.
    pub fn finish<T>(self, build: impl FnOnce() -> T) -> Result<T, ValidationError> {
        match ValidationError::from_vec(self.errors) {
            Some(errors) => Err(errors),
            None => Ok(build()),
        }
    }
}
