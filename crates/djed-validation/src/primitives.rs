use std::fmt::Display;
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;

use djed_result::NonEmptyErrors;

use crate::branded::{EmailAddress, Hostname, NonEmptyString};
use crate::error::violation;
use crate::validator::Validator;

fn type_mismatch<O>(expected: &'static str) -> impl Fn(&Value) -> Result<O, crate::error::ValidationError> {
    move |value| Err(violation("value", "type_mismatch", format!("expected {expected}, got {}", kind_name(value))))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Accepts any JSON string value.
pub fn string() -> Validator<Value, String> {
    Validator::new(|value: &Value| match value {
        Value::String(s) => Ok(s.clone()),
        other => type_mismatch("string")(other),
    })
}

/// Accepts any JSON number, widened to `f64`.
pub fn number() -> Validator<Value, f64> {
    Validator::new(|value: &Value| match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| violation("value", "not_finite", "number is not representable as f64")),
        other => type_mismatch("number")(other),
    })
}

/// Accepts a JSON boolean.
pub fn boolean() -> Validator<Value, bool> {
    Validator::new(|value: &Value| match value {
        Value::Bool(b) => Ok(*b),
        other => type_mismatch("boolean")(other),
    })
}

/// `string()` that additionally rejects the empty string.
pub fn non_empty_string() -> Validator<String, String> {
    Validator::new(|value: &String| {
        if value.is_empty() {
            Err(violation("value", "empty", "must not be empty"))
        } else {
            Ok(value.clone())
        }
    })
}

/// A minimal, widely-used email shape check: `local@domain.tld`. Not a full
/// RFC 5322 implementation, matching spec.md's "practically useful, not
/// exhaustively correct" validator philosophy.
pub fn email() -> Validator<String, String> {
    static PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
    let regex = Regex::new(PATTERN).expect("email pattern is a valid regex");
    Validator::new(move |value: &String| {
        if regex.is_match(value) {
            Ok(value.clone())
        } else {
            Err(violation("value", "invalid_email", "not a valid email address"))
        }
    })
}

/// Parses a UUID (any version) from its canonical string form.
pub fn uuid() -> Validator<String, uuid::Uuid> {
    Validator::new(|value: &String| {
        uuid::Uuid::parse_str(value)
            .map_err(|e| violation("value", "invalid_uuid", format!("not a valid UUID: {e}")))
    })
}

/// Parses an absolute URL.
pub fn url() -> Validator<String, url::Url> {
    Validator::new(|value: &String| {
        url::Url::parse(value).map_err(|e| violation("value", "invalid_url", format!("not a valid URL: {e}")))
    })
}

/// A TCP/UDP port number, 1-65535 (0 reserved/"any" is rejected as
/// impractical for a configured endpoint).
pub fn port() -> Validator<i64, u16> {
    Validator::new(|value: &i64| {
        if (1..=65535).contains(value) {
            Ok(*value as u16)
        } else {
            Err(violation("value", "out_of_range", format!("{value} is not a valid port (1-65535)")))
        }
    })
}

/// RFC 1123 hostname shape: labels of letters/digits/hyphens, no leading or
/// trailing hyphen per label, dot-separated.
pub fn hostname() -> Validator<String, String> {
    static PATTERN: &str = r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";
    let regex = Regex::new(PATTERN).expect("hostname pattern is a valid regex");
    Validator::new(move |value: &String| {
        if !value.is_empty() && value.len() <= 253 && regex.is_match(value) {
            Ok(value.clone())
        } else {
            Err(violation("value", "invalid_hostname", "not a valid hostname"))
        }
    })
}

/// [`email`] wrapped into the branded [`EmailAddress`] newtype, for callers
/// that want the type system to distinguish a validated address from a plain
/// `String`.
pub fn email_branded() -> Validator<String, EmailAddress> {
    email().map(EmailAddress::from)
}

/// [`hostname`] wrapped into the branded [`Hostname`] newtype.
pub fn hostname_branded() -> Validator<String, Hostname> {
    hostname().map(Hostname::from)
}

/// [`non_empty_string`] wrapped into the branded [`NonEmptyString`] newtype.
pub fn non_empty_string_branded() -> Validator<String, NonEmptyString> {
    non_empty_string().map(NonEmptyString::from)
}

/// Matches an arbitrary regex against a string input.
pub fn pattern(regex: Regex) -> Validator<String, String> {
    Validator::new(move |value: &String| {
        if regex.is_match(value) {
            Ok(value.clone())
        } else {
            Err(violation("value", "pattern_mismatch", format!("does not match /{}/", regex.as_str())))
        }
    })
}

/// Rejects values below `bound` (inclusive).
pub fn min<T>(bound: T) -> Validator<T, T>
where
    T: PartialOrd + Display + Clone + Send + Sync + 'static,
{
    Validator::new(move |value: &T| {
        if *value >= bound {
            Ok(value.clone())
        } else {
            Err(violation("value", "below_min", format!("{value} is below minimum {bound}")))
        }
    })
}

/// Rejects values above `bound` (inclusive).
pub fn max<T>(bound: T) -> Validator<T, T>
where
    T: PartialOrd + Display + Clone + Send + Sync + 'static,
{
    Validator::new(move |value: &T| {
        if *value <= bound {
            Ok(value.clone())
        } else {
            Err(violation("value", "above_max", format!("{value} exceeds maximum {bound}")))
        }
    })
}

/// Rejects any value not present in `allowed`.
pub fn one_of<T>(allowed: Vec<T>) -> Validator<T, T>
where
    T: PartialEq + Display + Clone + Send + Sync + 'static,
{
    Validator::new(move |value: &T| {
        if allowed.iter().any(|a| a == value) {
            Ok(value.clone())
        } else {
            let choices: Vec<String> = allowed.iter().map(|a| a.to_string()).collect();
            Err(violation("value", "not_allowed", format!("{value} is not one of [{}]", choices.join(", "))))
        }
    })
}

/// Parses a string into `T` via [`FromStr`], reporting parse failures as a
/// single violation.
pub fn parsed<T>() -> Validator<String, T>
where
    T: FromStr + Send + Sync + 'static,
    T::Err: Display,
{
    Validator::new(|value: &String| {
        value
            .parse::<T>()
            .map_err(|e| violation("value", "parse_failed", format!("could not parse '{value}': {e}")))
    })
}

/// Applies `of` to every element of a JSON array, accumulating every
/// element's violations (index-prefixed) rather than stopping at the first
/// failing element.
pub fn array<O>(of: Validator<Value, O>) -> Validator<Value, Vec<O>>
where
    O: Send + Sync + 'static,
{
    Validator::new(move |value: &Value| {
        let Value::Array(items) = value else {
            return type_mismatch("array")(value);
        };
        let mut results = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (index, item) in items.iter().enumerate() {
            match of.validate(item) {
                Ok(v) => results.push(v),
                Err(violations) => errors.extend(violations.into_vec().into_iter().map(|e| e.nest(&index.to_string()))),
            }
        }
        match NonEmptyErrors::from_vec(errors) {
            Some(errs) => Err(errs),
            None => Ok(results),
        }
    })
}

/// Applies `of` to every value of a JSON object, accumulating every key's
/// violations (key-prefixed).
pub fn record<O>(of: Validator<Value, O>) -> Validator<Value, std::collections::BTreeMap<String, O>>
where
    O: Send + Sync + 'static,
{
    Validator::new(move |value: &Value| {
        let Value::Object(map) = value else {
            return type_mismatch("object")(value);
        };
        let mut results = std::collections::BTreeMap::new();
        let mut errors = Vec::new();
        for (key, item) in map {
            match of.validate(item) {
                Ok(v) => {
                    results.insert(key.clone(), v);
                }
                Err(violations) => errors.extend(violations.into_vec().into_iter().map(|e| e.nest(key))),
            }
        }
        match NonEmptyErrors::from_vec(errors) {
            Some(errs) => Err(errs),
            None => Ok(results),
        }
    })
}

/// Validates a fixed two-element JSON array, accumulating both elements'
/// violations.
pub fn tuple2<A, B>(first: Validator<Value, A>, second: Validator<Value, B>) -> Validator<Value, (A, B)>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
{
    Validator::new(move |value: &Value| {
        let Value::Array(items) = value else {
            return type_mismatch("2-tuple")(value);
        };
        if items.len() != 2 {
            return Err(violation("value", "wrong_arity", format!("expected 2 elements, got {}", items.len())));
        }
        let mut errors = Vec::new();
        let a = first.validate(&items[0]).map_err(|e| errors.extend(e.into_vec().into_iter().map(|e| e.nest("0")))).ok();
        let b = second.validate(&items[1]).map_err(|e| errors.extend(e.into_vec().into_iter().map(|e| e.nest("1")))).ok();
        match NonEmptyErrors::from_vec(errors) {
            Some(errs) => Err(errs),
            None => Ok((a.expect("collected when no errors"), b.expect("collected when no errors"))),
        }
    })
}

/// Validates a fixed three-element JSON array, accumulating every element's
/// violations.
pub fn tuple3<A, B, C>(
    first: Validator<Value, A>,
    second: Validator<Value, B>,
    third: Validator<Value, C>,
) -> Validator<Value, (A, B, C)>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    Validator::new(move |value: &Value| {
        let Value::Array(items) = value else {
            return type_mismatch("3-tuple")(value);
        };
        if items.len() != 3 {
            return Err(violation("value", "wrong_arity", format!("expected 3 elements, got {}", items.len())));
        }
        let mut errors = Vec::new();
        let a = first.validate(&items[0]).map_err(|e| errors.extend(e.into_vec().into_iter().map(|e| e.nest("0")))).ok();
        let b = second.validate(&items[1]).map_err(|e| errors.extend(e.into_vec().into_iter().map(|e| e.nest("1")))).ok();
        let c = third.validate(&items[2]).map_err(|e| errors.extend(e.into_vec().into_iter().map(|e| e.nest("2")))).ok();
        match NonEmptyErrors::from_vec(errors) {
            Some(errs) => Err(errs),
            None => Ok((
                a.expect("collected when no errors"),
                b.expect("collected when no errors"),
                c.expect("collected when no errors"),
            )),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_rejects_non_string_json() {
        assert!(string().validate(&Value::Bool(true)).is_err());
        assert_eq!(string().validate(&Value::String("hi".into())), Ok("hi".to_string()));
    }

    #[test]
    fn port_rejects_out_of_range() {
        assert!(port().validate(&0).is_err());
        assert!(port().validate(&70000).is_err());
        assert_eq!(port().validate(&8080), Ok(8080));
    }

    #[test]
    fn email_requires_at_and_domain_dot() {
        assert!(email().validate(&"not-an-email".to_string()).is_err());
        assert_eq!(email().validate(&"a@b.com".to_string()), Ok("a@b.com".to_string()));
    }

    #[test]
    fn uuid_parses_canonical_form() {
        let parsed = uuid().validate(&"550e8400-e29b-41d4-a716-446655440000".to_string());
        assert!(parsed.is_ok());
        assert!(uuid().validate(&"not-a-uuid".to_string()).is_err());
    }

    #[test]
    fn array_accumulates_every_element_violation() {
        let elements = array(parsed_i64_min_zero());
        let value = serde_json::json!([1, -1, -2, 4]);
        let err = elements.validate(&value).unwrap_err();
        assert_eq!(err.len(), 2);
    }

    fn parsed_i64_min_zero() -> Validator<Value, i64> {
        Validator::new(|value: &Value| match value {
            Value::Number(n) => {
                let i = n.as_i64().ok_or_else(|| violation("value", "not_integer", "expected integer"))?;
                min(0).validate(&i)
            }
            other => type_mismatch("number")(other),
        })
    }

    #[test]
    fn one_of_reports_disallowed_value() {
        let v = one_of(vec!["a".to_string(), "b".to_string()]);
        assert!(v.validate(&"c".to_string()).is_err());
        assert_eq!(v.validate(&"a".to_string()), Ok("a".to_string()));
    }
}
