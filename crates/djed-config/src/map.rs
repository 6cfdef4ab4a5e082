use std::collections::BTreeMap;

use serde_json::Value;

/// One leaf value contributed by a source, carrying enough provenance to
/// attribute a later validation failure back to where the value came from
/// (spec.md §7).
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigEntry {
    pub value: Value,
    pub source: String,
}

/// A flattened view of configuration: dotted keys (`"server.port"`) to
/// scalar or array leaf values, each tagged with its source. This is the
/// monoid spec.md §3 describes: combining two maps is right-biased
/// (`combine(a, b)` keeps `b`'s entry whenever both define a key), which is
/// exactly what "later sources win" means for a layered config loader.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigMap {
    entries: BTreeMap<String, ConfigEntry>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens a nested JSON value into dotted-path entries tagged with
    /// `source`. Arrays are kept as single leaf values (spec.md's array
    /// validators operate on the whole array, not per-element paths).
    pub fn from_value(value: Value, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut entries = BTreeMap::new();
        flatten_into(&mut entries, String::new(), value, &source);
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.get(key)
    }

    /// Right-biased combine: `other`'s entries win on key collisions.
    pub fn combine(mut self, other: Self) -> Self {
        for (key, entry) in other.entries {
            self.entries.insert(key, entry);
        }
        self
    }

    /// Rebuilds a nested JSON object from the flattened dotted keys.
    pub fn to_value(&self) -> Value {
        let mut root = serde_json::Map::new();
        for (key, entry) in &self.entries {
            insert_path(&mut root, key, entry.value.clone());
        }
        Value::Object(root)
    }

    pub fn source_of(&self, dotted_path: &str) -> Option<&str> {
        self.entries.get(dotted_path).map(|e| e.source.as_str())
    }

    /// Like [`Self::source_of`], but when `field_path` (a validator error
    /// path, which may have extra segments appended by primitive validators
    /// like `"port.value"`) has no exact entry, falls back to the longest
    /// dotted prefix of it that does.
    pub fn source_of_prefix(&self, field_path: &str) -> Option<&str> {
        if let Some(source) = self.source_of(field_path) {
            return Some(source);
        }
        let segments: Vec<&str> = field_path.split('.').collect();
        for end in (1..segments.len()).rev() {
            let prefix = segments[..end].join(".");
            if let Some(source) = self.source_of(&prefix) {
                return Some(source);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flatten_into(out: &mut BTreeMap<String, ConfigEntry>, prefix: String, value: Value, source: &str) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                let path = if prefix.is_empty() { key } else { format!("{prefix}.{key}") };
                flatten_into(out, path, nested, source);
            }
        }
        leaf => {
            if !prefix.is_empty() {
                out.insert(prefix, ConfigEntry { value: leaf, source: source.to_string() });
            }
        }
    }
}

fn insert_path(root: &mut serde_json::Map<String, Value>, dotted_path: &str, value: Value) {
    let mut segments = dotted_path.split('.');
    let Some(first) = segments.next() else { return };
    let mut node = root.entry(first.to_string()).or_insert_with(|| Value::Object(Default::default()));
    let mut remaining: Vec<&str> = segments.collect();
    while !remaining.is_empty() {
        let segment = remaining.remove(0);
        if !node.is_object() {
            *node = Value::Object(Default::default());
        }
        let map = node.as_object_mut().expect("just ensured object");
        node = map.entry(segment.to_string()).or_insert_with(|| Value::Object(Default::default()));
    }
    *node = value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_then_unflatten_round_trips() {
        let value = serde_json::json!({"server": {"host": "localhost", "port": 8080}, "debug": true});
        let map = ConfigMap::from_value(value.clone(), "literal");
        assert_eq!(map.to_value(), value);
    }

    #[test]
    fn combine_is_right_biased() {
        let defaults = ConfigMap::from_value(serde_json::json!({"server": {"port": 80}}), "defaults");
        let overrides = ConfigMap::from_value(serde_json::json!({"server": {"port": 8080}}), "env");
        let merged = defaults.combine(overrides);
        assert_eq!(merged.get("server.port").unwrap().value, serde_json::json!(8080));
        assert_eq!(merged.source_of("server.port"), Some("env"));
    }

    #[test]
    fn combine_preserves_keys_unique_to_each_side() {
        let a = ConfigMap::from_value(serde_json::json!({"a": 1}), "a");
        let b = ConfigMap::from_value(serde_json::json!({"b": 2}), "b");
        let merged = a.combine(b);
        assert_eq!(merged.get("a").unwrap().value, serde_json::json!(1));
        assert_eq!(merged.get("b").unwrap().value, serde_json::json!(2));
    }
}
