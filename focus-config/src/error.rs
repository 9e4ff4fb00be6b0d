//! Configuration error types

use thiserror::Error;

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
///
/// Resolution outcomes are cached, so every variant owns plain data and the
/// whole enum is `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A mandatory property had no value in any source and no default
    #[error("Missing required property '{property}' (searched: {})", .searched.join(", "))]
    MissingRequiredProperty {
        property: String,
        searched: Vec<String>,
    },

    /// A source held a value that could not be converted to the property type
    #[error("Invalid value for '{key}' in {source_name}: {reason} (raw value: {raw})")]
    Conversion {
        property: String,
        key: String,
        source_name: String,
        raw: String,
        reason: String,
    },

    /// Computed defaults depend on each other
    #[error("Cyclic default detected: {}", .chain.join(" -> "))]
    CyclicDefault { chain: Vec<String> },

    /// A computed default required a sibling that resolved to no value
    #[error("Property '{property}' resolved to no value")]
    AbsentValue { property: String },

    /// Two descriptors with the same name in one group
    #[error("Property '{property}' is already registered in group '{group}'")]
    DuplicateProperty { group: String, property: String },

    /// Sibling lookup of a name the group does not know
    #[error("Unknown property '{property}' in group '{group}'")]
    UnknownProperty { group: String, property: String },

    /// Sibling lookup with the wrong value type
    #[error("Property '{property}' in group '{group}' is not of type {expected}")]
    TypeMismatch {
        group: String,
        property: String,
        expected: &'static str,
    },

    /// The group owning a property was dropped
    #[error("Configuration group '{0}' is no longer available")]
    GroupUnavailable(String),

    /// A computed default produced a value that is not valid for its type
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A report could not be rendered
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A backing store could not be read or parsed
    #[error("Failed to load source {source_name}: {message}")]
    SourceLoad {
        source_name: String,
        message: String,
    },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serialization(err.to_string())
    }
}

impl ConfigError {
    /// Helper for backing stores that fail while loading
    pub fn source_load(source_name: impl Into<String>, message: impl ToString) -> Self {
        ConfigError::SourceLoad {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error means "nothing was configured", as opposed to a
    /// value that was configured but unusable.
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            ConfigError::MissingRequiredProperty { .. } | ConfigError::AbsentValue { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_property_message_lists_searched_keys() {
        let err = ConfigError::MissingRequiredProperty {
            property: "domain".to_string(),
            searched: vec![
                "jicofo.xmpp.client.domain@current".to_string(),
                "org.jitsi.jicofo.FOCUS_USER_DOMAIN@legacy".to_string(),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("'domain'"));
        assert!(message.contains("jicofo.xmpp.client.domain@current, org.jitsi.jicofo.FOCUS_USER_DOMAIN@legacy"));
        assert!(err.is_missing());
    }

    #[test]
    fn test_json_errors_convert() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error: "));
        assert!(!err.is_missing());
    }

    #[test]
    fn test_cycle_message() {
        let err = ConfigError::CyclicDefault {
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic default detected: a -> b -> a");
        assert!(!err.is_missing());
    }
}
