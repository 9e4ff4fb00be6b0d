//! Environment variable store

use crate::source::{RawValue, Source};
use std::collections::HashMap;

/// Snapshot of environment variables taken at construction
///
/// Keys map to variable names by upper-casing and replacing every
/// non-alphanumeric character with `_`, optionally behind a prefix:
/// `jicofo.xmpp.client.port` with prefix `FOCUS` reads
/// `FOCUS_JICOFO_XMPP_CLIENT_PORT`. Values are always strings.
#[derive(Debug, Clone)]
pub struct EnvSource {
    name: String,
    prefix: Option<String>,
    vars: HashMap<String, String>,
}

impl EnvSource {
    /// Snapshot the process environment without a prefix
    pub fn new() -> Self {
        Self::from_vars(None, std::env::vars())
    }

    /// Snapshot the process environment with a variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::from_vars(Some(prefix.into()), std::env::vars())
    }

    /// Build from explicit variables
    pub fn from_vars<K, V>(prefix: Option<String>, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let prefix = prefix.filter(|p| !p.is_empty());
        Self {
            name: match &prefix {
                Some(p) => format!("env({})", p),
                None => "env".to_string(),
            },
            prefix,
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Variable name consulted for `key`
    pub fn var_name(&self, key: &str) -> String {
        let body: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();

        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, body),
            None => body,
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for EnvSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<RawValue> {
        self.vars
            .get(&self.var_name(key))
            .map(|value| RawValue::String(value.clone()))
    }

    fn origin(&self, key: &str) -> String {
        format!("env({})", self.var_name(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use temp_env::with_vars;

    #[test]
    fn test_var_name_mapping() {
        let plain = EnvSource::from_vars(None, Vec::<(String, String)>::new());
        assert_eq!(
            plain.var_name("jicofo.xmpp.client.reply-timeout"),
            "JICOFO_XMPP_CLIENT_REPLY_TIMEOUT"
        );

        let prefixed = EnvSource::from_vars(Some("FOCUS".to_string()), Vec::<(String, String)>::new());
        assert_eq!(prefixed.var_name("a.b"), "FOCUS_A_B");
        assert_eq!(prefixed.name(), "env(FOCUS)");
        assert_eq!(prefixed.origin("jicofo.xmpp.client.port"), "env(FOCUS_JICOFO_XMPP_CLIENT_PORT)");
    }

    #[test]
    fn test_lookup_from_explicit_vars() {
        let source = EnvSource::from_vars(None, [("JICOFO_XMPP_CLIENT_PORT", "5347")]);
        assert_eq!(source.lookup("jicofo.xmpp.client.port"), Some(json!("5347")));
        assert_eq!(source.lookup("jicofo.xmpp.client.hostname"), None);
    }

    #[test]
    fn test_snapshot_ignores_later_changes() {
        with_vars([("FOCUSTEST_SNAPSHOT_KEY", Some("before"))], || {
            let source = EnvSource::with_prefix("FOCUSTEST");
            std::env::set_var("FOCUSTEST_SNAPSHOT_KEY", "after");
            assert_eq!(source.lookup("snapshot.key"), Some(json!("before")));
        });
    }

    #[test]
    fn test_empty_prefix_is_no_prefix() {
        let source = EnvSource::from_vars(Some(String::new()), [("A_B", "1")]);
        assert_eq!(source.lookup("a.b"), Some(json!("1")));
        assert_eq!(source.name(), "env");
    }
}
