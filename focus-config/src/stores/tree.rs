//! Nested document store (YAML or JSON)

use crate::error::{ConfigError, ConfigResult};
use crate::source::{RawValue, Source};
use serde_json::Value;
use std::path::Path;

/// Source backed by a nested document
///
/// `lookup("a.b.c")` first tries a top-level key literally named `a.b.c`,
/// then walks the objects `a` → `b` → `c`.
#[derive(Debug, Clone)]
pub struct TreeSource {
    name: String,
    root: Value,
}

impl TreeSource {
    pub fn new(name: impl Into<String>, root: Value) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Parse a YAML document
    pub fn from_yaml_str(name: impl Into<String>, content: &str) -> ConfigResult<Self> {
        let name = name.into();
        let root: Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::source_load(&name, e))?;
        Ok(Self::new(name, root))
    }

    /// Parse a JSON document
    pub fn from_json_str(name: impl Into<String>, content: &str) -> ConfigResult<Self> {
        let name = name.into();
        let root: Value =
            serde_json::from_str(content).map_err(|e| ConfigError::source_load(&name, e))?;
        Ok(Self::new(name, root))
    }

    /// Load a document from disk; `.json` files are parsed as JSON, anything
    /// else as YAML.
    pub fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> ConfigResult<Self> {
        let name = name.into();
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::source_load(&name, format!("{}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(name, &content)
        } else {
            Self::from_yaml_str(name, &content)
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }
}

impl Source for TreeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        let found = match self.root.get(key) {
            Some(value) => Some(value),
            None => key
                .split('.')
                .try_fold(&self.root, |node, segment| node.get(segment)),
        };

        match found {
            Some(Value::Null) | None => None,
            Some(value) => Some(value.clone()),
        }
    }
}
