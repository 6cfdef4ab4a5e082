use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ConfigError;
use crate::map::ConfigMap;

/// One layer of configuration. Sources are combined left-to-right by
/// [`crate::loader::ConfigLoader`], later sources winning per key (spec.md
/// §3's "env > file > defaults" loading hierarchy, generalized to any
/// ordered list of sources).
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<ConfigMap, ConfigError>;

    /// Human-readable name used in error messages and field-error
    /// attribution (`"env"`, `"file:/etc/app/config.yaml"`, ...).
    fn name(&self) -> String;
}

/// Reads environment variables under `prefix`, turning `PREFIX_DB__HOST`
/// into the dotted key `db.host` (double underscore nests, single
/// underscore separates words within a segment — the same convention the
/// teacher's `apply_env_overrides` follows for `KNHK_CONNECTOR_<NAME>_<SETTING>`).
/// Values are parsed as JSON when possible (`"true"` -> bool, `"8080"` ->
/// number) and fall back to a plain string otherwise.
pub struct EnvSource {
    prefix: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn env_key_to_path(&self, key: &str) -> Option<String> {
        let rest = key.strip_prefix(&self.prefix)?.strip_prefix('_')?;
        if rest.is_empty() {
            return None;
        }
        Some(rest.to_lowercase().replace("__", "."))
    }
}

impl ConfigSource for EnvSource {
    fn load(&self) -> Result<ConfigMap, ConfigError> {
        let mut map = ConfigMap::new();
        for (key, raw_value) in std::env::vars() {
            let Some(path) = self.env_key_to_path(&key) else { continue };
            let value = serde_json::from_str::<Value>(&raw_value).unwrap_or(Value::String(raw_value));
            let mut object = serde_json::Map::new();
            set_dotted(&mut object, &path, value);
            map = map.combine(ConfigMap::from_value(Value::Object(object), self.name()));
        }
        Ok(map)
    }

    fn name(&self) -> String {
        format!("env:{}", self.prefix)
    }
}

fn set_dotted(root: &mut serde_json::Map<String, Value>, dotted_path: &str, value: Value) {
    let mut segments: Vec<&str> = dotted_path.split('.').collect();
    let last = segments.pop().expect("split always yields at least one segment");
    let mut current = root;
    for segment in segments {
        let entry = current.entry(segment.to_string()).or_insert_with(|| Value::Object(Default::default()));
        if !entry.is_object() {
            *entry = Value::Object(Default::default());
        }
        current = entry.as_object_mut().expect("just ensured object");
    }
    current.insert(last.to_string(), value);
}

/// Reads a JSON or YAML file, sniffed by extension (`.json` vs `.yaml`/
/// `.yml`), and flattens it into a [`ConfigMap`].
pub struct FileSource {
    path: PathBuf,
    /// When `true` (the default), a missing file loads as an empty map
    /// instead of erroring — convenient for optional override files.
    optional: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), optional: false }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

impl ConfigSource for FileSource {
    fn load(&self) -> Result<ConfigMap, ConfigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if self.optional && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ConfigMap::new());
            }
            Err(e) => {
                return Err(ConfigError::Io { source_name: self.name(), message: e.to_string() });
            }
        };

        let format = file_format(&self.path);
        let value: Value = match format {
            "yaml" => serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::Parse { source_name: self.name(), format: "yaml", message: e.to_string() })?,
            _ => serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse { source_name: self.name(), format: "json", message: e.to_string() })?,
        };
        Ok(ConfigMap::from_value(value, self.name()))
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

fn file_format(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => "yaml",
        _ => "json",
    }
}

/// An in-memory source, mainly for defaults and tests.
pub struct LiteralSource {
    value: Value,
    source_name: String,
}

impl LiteralSource {
    pub fn new(value: Value) -> Self {
        Self { value, source_name: "literal".to_string() }
    }

    pub fn named(value: Value, source_name: impl Into<String>) -> Self {
        Self { value, source_name: source_name.into() }
    }
}

impl ConfigSource for LiteralSource {
    fn load(&self) -> Result<ConfigMap, ConfigError> {
        Ok(ConfigMap::from_value(self.value.clone(), self.source_name.clone()))
    }

    fn name(&self) -> String {
        self.source_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_source_nests_double_underscore_as_dot() {
        // SAFETY: single-threaded test process, no concurrent env mutation.
        unsafe {
            std::env::set_var("DJEDTEST_SERVER__PORT", "9090");
        }
        let source = EnvSource::new("DJEDTEST");
        let map = source.load().unwrap();
        assert_eq!(map.get("server.port").unwrap().value, serde_json::json!(9090));
        unsafe {
            std::env::remove_var("DJEDTEST_SERVER__PORT");
        }
    }

    #[test]
    fn literal_source_flattens_nested_object() {
        let source = LiteralSource::new(serde_json::json!({"a": {"b": 1}}));
        let map = source.load().unwrap();
        assert_eq!(map.get("a.b").unwrap().value, serde_json::json!(1));
    }

    #[test]
    fn file_source_is_optional_when_missing() {
        let source = FileSource::new("/nonexistent/path/does-not-exist.json").optional();
        let map = source.load().unwrap();
        assert!(map.is_empty());
    }
}
