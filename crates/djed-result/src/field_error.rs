use std::fmt;

use serde::{Deserialize, Serialize};

/// A single validation failure, attributable to one field.
///
/// `path` is the dotted key trail (`"address.zip"`), `code` is a stable
/// machine-readable identifier (`"nonEmpty"`, `"min"`, `"email"`) and
/// `message` is the human-readable description. Wire shape per spec §6:
/// `{path, code, message}`, with `detail` as an optional extra (used by
/// `djed-config` to attribute a failing key to the source it came from).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

impl FieldError {
    pub fn new(path: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// Adds or replaces the optional diagnostic detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns a copy with `prefix.` prepended to `path`, used when a nested
    /// validator's errors are folded into a parent struct's field.
    pub fn nest(&self, prefix: &str) -> Self {
        Self {
            path: format!("{prefix}.{}", self.path),
            code: self.code.clone(),
            message: self.message.clone(),
            detail: self.detail.clone(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.path, self.message, self.code)?;
        if let Some(ref detail) = self.detail {
            write!(f, " [{detail}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nest_prefixes_path_only() {
        let err = FieldError::new("zip", "nonEmpty", "must not be empty");
        let nested = err.nest("address");
        assert_eq!(nested.path, "address.zip");
        assert_eq!(nested.code, "nonEmpty");
    }
}
