//! Configuration sources
//!
//! A [`Source`] is a read-only key/value lookup. Sources know nothing about
//! precedence: property descriptors hold an ordered list of
//! `(source, key)` pairs and take the first present value.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Untyped value as stored by a backing source
pub type RawValue = Value;

/// Shared handle to a source
pub type SourceRef = Arc<dyn Source>;

/// Read-only key/value configuration store
///
/// `lookup` returns `None` for keys the store does not hold. Not finding a
/// key is never an error.
pub trait Source: Send + Sync + fmt::Debug {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Look up a raw value by key
    fn lookup(&self, key: &str) -> Option<RawValue>;

    /// Whether values served from here come from a deprecated format
    fn is_legacy(&self) -> bool {
        false
    }

    /// Where the value for `key` actually comes from, for error messages
    ///
    /// Composite and environment sources narrow this down to the layer or
    /// variable holding the key.
    fn origin(&self, _key: &str) -> String {
        self.name().to_string()
    }
}

/// Render a raw value the way it would appear in a config file
pub fn display_raw(raw: &RawValue) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// In-memory source
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    name: String,
    values: HashMap<String, RawValue>,
}

impl MapSource {
    /// Create an empty map source
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: HashMap::new(),
        }
    }

    /// Create a map source from key/value pairs
    pub fn from_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self {
            name: name.into(),
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Add a value, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Wrap into a shared handle
    pub fn shared(self) -> SourceRef {
        Arc::new(self)
    }
}

impl Source for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        match self.values.get(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value.clone()),
        }
    }
}

/// Composite source returning the first present value among its layers
///
/// Layers are ordered highest precedence first.
#[derive(Debug, Clone)]
pub struct LayeredSource {
    name: String,
    layers: Vec<SourceRef>,
}

impl LayeredSource {
    pub fn new(name: impl Into<String>, layers: Vec<SourceRef>) -> Self {
        Self {
            name: name.into(),
            layers,
        }
    }

    pub fn layers(&self) -> &[SourceRef] {
        &self.layers
    }

    /// Find the layer that would answer `key`, with its value
    pub fn lookup_with_layer(&self, key: &str) -> Option<(&SourceRef, RawValue)> {
        self.layers
            .iter()
            .find_map(|layer| layer.lookup(key).map(|value| (layer, value)))
    }
}

impl Source for LayeredSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        self.lookup_with_layer(key).map(|(_, value)| value)
    }

    fn origin(&self, key: &str) -> String {
        match self.lookup_with_layer(key) {
            Some((layer, _)) => format!("{}/{}", self.name, layer.origin(key)),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_source_lookup() {
        let source = MapSource::new("test")
            .with("server.port", 5222)
            .with("server.hostname", "localhost");

        assert_eq!(source.name(), "test");
        assert_eq!(source.lookup("server.port"), Some(json!(5222)));
        assert_eq!(source.lookup("server.hostname"), Some(json!("localhost")));
        assert_eq!(source.lookup("server.missing"), None);
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_null_is_absent() {
        let source = MapSource::from_pairs("test", [("a", Value::Null)]);
        assert_eq!(source.lookup("a"), None);
    }

    #[test]
    fn test_layered_source_first_layer_wins() {
        let env = MapSource::new("env").with("port", "6000").shared();
        let file = MapSource::new("file")
            .with("port", 5222)
            .with("hostname", "xmpp.example.com")
            .shared();
        let layered = LayeredSource::new("current", vec![env, file]);

        assert_eq!(layered.lookup("port"), Some(json!("6000")));
        assert_eq!(layered.lookup("hostname"), Some(json!("xmpp.example.com")));
        assert_eq!(layered.lookup("nope"), None);

        let (layer, _) = layered.lookup_with_layer("hostname").unwrap();
        assert_eq!(layer.name(), "file");
    }

    #[test]
    fn test_layered_origin_names_the_answering_layer() {
        let env = MapSource::new("env").with("port", "6000").shared();
        let file = MapSource::new("file").with("hostname", "xmpp.example.com").shared();
        let layered = LayeredSource::new("current", vec![env, file]);

        assert_eq!(layered.origin("port"), "current/env");
        assert_eq!(layered.origin("hostname"), "current/file");
        assert_eq!(layered.origin("nope"), "current");
        assert_eq!(MapSource::new("reference").origin("port"), "reference");
    }

    #[test]
    fn test_display_raw() {
        assert_eq!(display_raw(&json!("abc")), "abc");
        assert_eq!(display_raw(&json!(42)), "42");
        assert_eq!(display_raw(&json!([1, 2])), "[1,2]");
    }
}
