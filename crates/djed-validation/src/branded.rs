use std::fmt;

/// Macro for the zero-cost branded newtypes spec.md §4.2 calls for: an
/// "opaque alias, distinguished only at the type layer" over `String`, so a
/// validated value can't be confused with an un-validated one of the same
/// underlying representation.
macro_rules! branded_string {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

branded_string!(EmailAddress);
branded_string!(Hostname);
branded_string!(NonEmptyString);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branded_type_round_trips_through_string() {
        let email: EmailAddress = "a@b.com".to_string().into();
        assert_eq!(email.as_ref(), "a@b.com");
        assert_eq!(email.into_inner(), "a@b.com".to_string());
    }
}
