use std::fmt;

use serde::{Deserialize, Serialize};

/// A type that can be combined with another value of the same type without
/// losing information. Errors in Djed accumulate through this trait rather
/// than overwriting one another.
///
/// Laws: associativity — `a.combine(b).combine(c) == a.combine(b.combine(c))`.
pub trait Semigroup {
    fn combine(self, other: Self) -> Self;
}

/// A list of errors guaranteed to hold at least one element.
///
/// This is the error side of accumulation (spec §3, §4.2): `struct`-style
/// validators and `bracket` release failures both combine through this type
/// rather than keeping only the first failure. Insertion order is preserved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonEmptyErrors<T>(Vec<T>);

impl<T> NonEmptyErrors<T> {
    /// Wrap a single error.
    pub fn single(item: T) -> Self {
        Self(vec![item])
    }

    /// Build from a non-empty `Vec`. Returns `None` if `items` is empty.
    pub fn from_vec(items: Vec<T>) -> Option<Self> {
        if items.is_empty() { None } else { Some(Self(items)) }
    }

    pub fn push(&mut self, item: T) {
        self.0.push(item);
    }

    pub fn first(&self) -> &T {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` — construction guarantees at least one element.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T> Semigroup for NonEmptyErrors<T> {
    /// Concatenates `other`'s items after `self`'s, preserving order.
    fn combine(mut self, other: Self) -> Self {
        self.0.extend(other.0);
        self
    }
}

impl<T> IntoIterator for NonEmptyErrors<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a NonEmptyErrors<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<T: fmt::Display> fmt::Display for NonEmptyErrors<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for NonEmptyErrors<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_preserves_insertion_order() {
        let a = NonEmptyErrors::single("first");
        let b = NonEmptyErrors::from_vec(vec!["second", "third"]).unwrap();
        let combined = a.combine(b);
        assert_eq!(combined.into_vec(), vec!["first", "second", "third"]);
    }

    #[test]
    fn from_vec_rejects_empty() {
        assert!(NonEmptyErrors::<&str>::from_vec(vec![]).is_none());
    }
}
