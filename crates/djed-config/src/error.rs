use thiserror::Error;

use djed_validation::ValidationError;

/// Failures from loading and merging configuration sources, kept distinct
/// from the downstream [`ValidationError`] produced once the merged map is
/// handed to a typed `Validator` (spec.md §3/§7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config source '{source_name}': {message}")]
    Io { source_name: String, message: String },
    #[error("failed to parse config source '{source_name}' as {format}: {message}")]
    Parse {
        source_name: String,
        format: &'static str,
        message: String,
    },
    #[error("configuration invalid")]
    Invalid(#[from] ValidationError),
}
