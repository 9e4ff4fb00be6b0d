//! Conversion of raw source values into typed property values
//!
//! [`FromRaw`] is the registry of built-in conversions, keyed by target
//! type. [`Converter`] wraps any conversion function so descriptors can carry
//! ad-hoc conversions, e.g. "read a string, then parse it as a JID".
//! Converters are pure: they see only the raw value.

use crate::source::RawValue;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Reason a raw value could not be converted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConversionFailure(pub String);

impl ConversionFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    fn expected(type_name: &str, raw: &RawValue) -> Self {
        Self(format!("expected {}, found {}", type_name, kind_of(raw)))
    }
}

fn kind_of(raw: &RawValue) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Types with a built-in conversion from raw values
pub trait FromRaw: Sized {
    /// Name used in error messages
    const TYPE_NAME: &'static str;

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure>;
}

impl FromRaw for String {
    const TYPE_NAME: &'static str = "string";

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure> {
        match raw {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(ConversionFailure::expected(Self::TYPE_NAME, other)),
        }
    }
}

impl FromRaw for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure> {
        match raw {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(ConversionFailure::new(format!("'{}' is not a boolean", s))),
            },
            other => Err(ConversionFailure::expected(Self::TYPE_NAME, other)),
        }
    }
}

macro_rules! integer_from_raw {
    ($($ty:ty),*) => {
        $(
            impl FromRaw for $ty {
                const TYPE_NAME: &'static str = stringify!($ty);

                fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure> {
                    match raw {
                        Value::Number(n) => {
                            let wide = n
                                .as_i64()
                                .map(i128::from)
                                .or_else(|| n.as_u64().map(i128::from))
                                .ok_or_else(|| {
                                    ConversionFailure::new(format!("{} is not an integer", n))
                                })?;
                            <$ty>::try_from(wide).map_err(|_| {
                                ConversionFailure::new(format!(
                                    "{} is out of range for {}",
                                    n,
                                    Self::TYPE_NAME
                                ))
                            })
                        }
                        Value::String(s) => s.trim().parse::<$ty>().map_err(|e| {
                            ConversionFailure::new(format!("'{}' is not a valid {}: {}", s, Self::TYPE_NAME, e))
                        }),
                        other => Err(ConversionFailure::expected(Self::TYPE_NAME, other)),
                    }
                }
            }
        )*
    };
}

integer_from_raw!(i32, i64, u16, u32, u64, usize);

impl FromRaw for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure> {
        match raw {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| ConversionFailure::new(format!("{} is not a number", n))),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| ConversionFailure::new(format!("'{}' is not a number: {}", s, e))),
            other => Err(ConversionFailure::expected(Self::TYPE_NAME, other)),
        }
    }
}

/// Durations: integers are milliseconds, strings are human readable
/// (`15 seconds`, `500ms`, `1m 30s`) or bare milliseconds.
impl FromRaw for Duration {
    const TYPE_NAME: &'static str = "duration";

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure> {
        match raw {
            Value::Number(n) => n
                .as_u64()
                .map(Duration::from_millis)
                .ok_or_else(|| {
                    ConversionFailure::new(format!("{} is not a non-negative millisecond count", n))
                }),
            Value::String(s) => parse_duration(s),
            other => Err(ConversionFailure::expected(Self::TYPE_NAME, other)),
        }
    }
}

fn parse_duration(text: &str) -> Result<Duration, ConversionFailure> {
    let trimmed = text.trim();
    if let Ok(millis) = trimmed.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }

    // "15 seconds" -> "15seconds"; humantime separates components on spaces
    let mut normalized = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars().peekable();
    while let Some(c) = chars.next() {
        normalized.push(c);
        if c.is_ascii_digit() {
            while chars.peek().map(|n| *n == ' ').unwrap_or(false) {
                chars.next();
            }
        }
    }

    humantime::parse_duration(&normalized)
        .map_err(|e| ConversionFailure::new(format!("'{}' is not a valid duration: {}", text, e)))
}

/// Lists: arrays of scalars or comma-separated strings
impl FromRaw for Vec<String> {
    const TYPE_NAME: &'static str = "list of strings";

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure> {
        match raw {
            Value::Array(items) => items.iter().map(String::from_raw).collect(),
            Value::String(s) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()),
            other => Err(ConversionFailure::expected(Self::TYPE_NAME, other)),
        }
    }
}

type ConvertFn<T> = dyn Fn(&RawValue) -> Result<T, ConversionFailure> + Send + Sync;

/// A shareable conversion function
pub struct Converter<T> {
    convert: Arc<ConvertFn<T>>,
}

impl<T: 'static> Converter<T> {
    /// Wrap an arbitrary conversion
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&RawValue) -> Result<T, ConversionFailure> + Send + Sync + 'static,
    {
        Self {
            convert: Arc::new(f),
        }
    }

    /// Convert to `R` with its built-in conversion, then map through `f`
    pub fn via<R, E, F>(f: F) -> Self
    where
        R: FromRaw + 'static,
        E: fmt::Display + 'static,
        F: Fn(R) -> Result<T, E> + Send + Sync + 'static,
    {
        Self::from_fn(move |raw| {
            let intermediate = R::from_raw(raw)?;
            f(intermediate).map_err(|e| ConversionFailure::new(e.to_string()))
        })
    }

    pub fn apply(&self, raw: &RawValue) -> Result<T, ConversionFailure> {
        (self.convert)(raw)
    }
}

impl<T: FromRaw + 'static> Converter<T> {
    /// The built-in conversion for `T`
    pub fn native() -> Self {
        Self::from_fn(T::from_raw)
    }
}

impl<T> Clone for Converter<T> {
    fn clone(&self) -> Self {
        Self {
            convert: Arc::clone(&self.convert),
        }
    }
}

impl<T> fmt::Debug for Converter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_conversion() {
        assert_eq!(String::from_raw(&json!("abc")).unwrap(), "abc");
        assert_eq!(String::from_raw(&json!(5222)).unwrap(), "5222");
        assert_eq!(String::from_raw(&json!(true)).unwrap(), "true");
        assert!(String::from_raw(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_bool_conversion() {
        assert!(bool::from_raw(&json!(true)).unwrap());
        assert!(bool::from_raw(&json!("TRUE")).unwrap());
        assert!(bool::from_raw(&json!(" yes ")).unwrap());
        assert!(!bool::from_raw(&json!("off")).unwrap());
        assert!(bool::from_raw(&json!("maybe")).is_err());
        assert!(bool::from_raw(&json!(1)).is_err());
    }

    #[test]
    fn test_integer_conversion() {
        assert_eq!(u16::from_raw(&json!(5222)).unwrap(), 5222);
        assert_eq!(u16::from_raw(&json!(" 5347 ")).unwrap(), 5347);
        assert_eq!(i64::from_raw(&json!(-3)).unwrap(), -3);

        let err = i32::from_raw(&json!("not-a-number")).unwrap_err();
        assert!(err.to_string().contains("not-a-number"));

        let err = u16::from_raw(&json!(70000)).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        assert!(u32::from_raw(&json!(-1)).is_err());
        assert!(i32::from_raw(&json!(1.5)).is_err());
        assert!(i32::from_raw(&json!([1])).is_err());
    }

    #[test]
    fn test_duration_conversion() {
        assert_eq!(
            Duration::from_raw(&json!("15 seconds")).unwrap(),
            Duration::from_secs(15)
        );
        assert_eq!(
            Duration::from_raw(&json!("500ms")).unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(
            Duration::from_raw(&json!("1m 30s")).unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            Duration::from_raw(&json!(2500)).unwrap(),
            Duration::from_millis(2500)
        );
        assert_eq!(
            Duration::from_raw(&json!("2500")).unwrap(),
            Duration::from_millis(2500)
        );
        assert!(Duration::from_raw(&json!("soon")).is_err());
        assert!(Duration::from_raw(&json!(-5)).is_err());
    }

    #[test]
    fn test_list_conversion() {
        assert_eq!(
            Vec::<String>::from_raw(&json!("a, b,,c")).unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            Vec::<String>::from_raw(&json!(["x", 1, false])).unwrap(),
            vec!["x", "1", "false"]
        );
    }

    #[test]
    fn test_converter_via() {
        let converter: Converter<String> = Converter::via(|s: String| {
            if s.contains('@') {
                Err("must not contain '@'")
            } else {
                Ok(s.to_uppercase())
            }
        });

        assert_eq!(converter.apply(&json!("abc")).unwrap(), "ABC");
        assert_eq!(
            converter.apply(&json!("a@b")).unwrap_err(),
            ConversionFailure::new("must not contain '@'")
        );
        // the intermediate conversion fails first
        assert!(converter.apply(&json!([1])).is_err());
    }

    #[test]
    fn test_native_converter() {
        let converter = Converter::<u16>::native();
        let cloned = converter.clone();
        assert_eq!(cloned.apply(&json!("443")).unwrap(), 443);
        assert!(format!("{:?}", converter).contains("u16"));
    }
}
