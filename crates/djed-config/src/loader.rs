use djed_validation::Validator;

use crate::error::ConfigError;
use crate::map::ConfigMap;
use crate::sources::ConfigSource;

/// Merges an ordered list of [`ConfigSource`]s and validates the result into
/// a typed configuration (spec.md §3, §6).
pub struct ConfigLoader {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { sources: Vec::new() }
    }

    /// Appends a source. Sources added later win on key collisions.
    pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Loads and right-biased-merges every source into one [`ConfigMap`].
    pub fn load_merged(&self) -> Result<ConfigMap, ConfigError> {
        let mut merged = ConfigMap::new();
        for source in &self.sources {
            tracing::debug!(source = %source.name(), "loading config source");
            merged = merged.combine(source.load()?);
        }
        Ok(merged)
    }

    /// Loads, merges, and validates into `T`. Every [`djed_result::FieldError`]
    /// in a failure is enriched with `detail` naming the source that
    /// contributed the offending key, when that key came from a tracked
    /// source.
    pub fn load<T: 'static>(&self, validator: &Validator<serde_json::Value, T>) -> Result<T, ConfigError> {
        let merged = self.load_merged()?;
        let value = merged.to_value();
        validator.validate(&value).map_err(|errors| {
            let attributed = errors
                .into_vec()
                .into_iter()
                .map(|error| match merged.source_of_prefix(&error.path) {
                    Some(source) => error.with_detail(format!("from {source}")),
                    None => error,
                })
                .collect::<Vec<_>>();
            ConfigError::Invalid(djed_validation::ValidationError::from_vec(attributed).expect("non-empty by construction"))
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::LiteralSource;
    use djed_validation::{primitives, FieldAccumulator};

    #[derive(Debug, PartialEq)]
    struct ServerConfig {
        host: String,
        port: u16,
    }

    fn server_validator() -> Validator<serde_json::Value, ServerConfig> {
        Validator::new(|value: &serde_json::Value| {
            let mut fields = FieldAccumulator::new();
            let host = fields.nested_field("host", primitives::hostname().validate(&value["host"].as_str().unwrap_or_default().to_string()));
            let port = fields.nested_field(
                "port",
                primitives::port().validate(&value["port"].as_i64().unwrap_or(-1)),
            );
            fields.finish(|| ServerConfig { host: host.unwrap(), port: port.unwrap() })
        })
    }

    #[test]
    fn later_source_overrides_earlier_for_same_key() {
        let loader = ConfigLoader::new()
            .add_source(LiteralSource::named(serde_json::json!({"host": "example.com", "port": 80}), "defaults"))
            .add_source(LiteralSource::named(serde_json::json!({"port": 9090}), "override"));
        let config = loader.load(&server_validator()).unwrap();
        assert_eq!(config, ServerConfig { host: "example.com".to_string(), port: 9090 });
    }

    #[test]
    fn validation_failure_is_attributed_to_its_source() {
        let loader = ConfigLoader::new()
            .add_source(LiteralSource::named(serde_json::json!({"host": "example.com", "port": 0}), "defaults"));
        let error = loader.load(&server_validator()).unwrap_err();
        match error {
            ConfigError::Invalid(errors) => {
                let port_error = errors.iter().find(|e| e.path == "port.value").unwrap();
                assert_eq!(port_error.detail.as_deref(), Some("from defaults"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }
}
