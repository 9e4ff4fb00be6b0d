//! Property descriptors
//!
//! A [`PropertyDescriptor`] says where a property lives and how to turn it
//! into a typed value:
//!
//! ```
//! use focus_config::{MapSource, PropertyGroup, RequiredDescriptor};
//!
//! let current = MapSource::new("current").with("xmpp.port", 5347).shared();
//! let legacy = MapSource::new("legacy").with("XMPP_PORT", "5222").shared();
//!
//! let group = PropertyGroup::new("client", "xmpp");
//! let port = group
//!     .register(
//!         RequiredDescriptor::<u16>::required("port")
//!             .from(&current, group.key("port"))
//!             .from(&legacy, "XMPP_PORT"),
//!     )
//!     .unwrap();
//!
//! assert_eq!(port.resolve().unwrap(), 5347);
//! ```

use crate::convert::{Converter, FromRaw};
use crate::error::{ConfigError, ConfigResult};
use crate::group::Siblings;
use crate::source::SourceRef;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Whether a property must resolve to a value
pub trait Presence: Send + Sync + 'static {
    const MANDATORY: bool;

    /// What `resolve()` hands out for a property of type `T`
    type Output<T>;

    fn finish<T>(value: Option<T>, property: &str) -> ConfigResult<Self::Output<T>>;
}

/// Marker for properties that must resolve to a value
#[derive(Debug, Clone, Copy)]
pub enum Mandatory {}

/// Marker for properties that may resolve to no value
#[derive(Debug, Clone, Copy)]
pub enum Optional {}

impl Presence for Mandatory {
    const MANDATORY: bool = true;
    type Output<T> = T;

    fn finish<T>(value: Option<T>, property: &str) -> ConfigResult<T> {
        value.ok_or_else(|| ConfigError::AbsentValue {
            property: property.to_string(),
        })
    }
}

impl Presence for Optional {
    const MANDATORY: bool = false;
    type Output<T> = Option<T>;

    fn finish<T>(value: Option<T>, _property: &str) -> ConfigResult<Option<T>> {
        Ok(value)
    }
}

type ComputeFn<T> = dyn Fn(&Siblings) -> ConfigResult<T> + Send + Sync;

/// Fallback used when no source holds a value
pub enum DefaultValue<T> {
    Static(T),
    /// Derived from other properties of the same group
    Computed(Arc<ComputeFn<T>>),
}

impl<T: Clone> Clone for DefaultValue<T> {
    fn clone(&self) -> Self {
        match self {
            DefaultValue::Static(value) => DefaultValue::Static(value.clone()),
            DefaultValue::Computed(compute) => DefaultValue::Computed(Arc::clone(compute)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for DefaultValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed"),
        }
    }
}

/// One place to look for a value
pub struct Lookup<T> {
    pub source: SourceRef,
    pub key: String,
    /// Overrides the descriptor's converter for this source only
    pub converter: Option<Converter<T>>,
}

impl<T> Lookup<T> {
    /// `key@source`, as used in error messages
    pub fn describe(&self) -> String {
        format!("{}@{}", self.key, self.source.name())
    }
}

impl<T> Clone for Lookup<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            key: self.key.clone(),
            converter: self.converter.clone(),
        }
    }
}

impl<T> fmt::Debug for Lookup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Declaration of one typed configuration property
///
/// `P` is [`Mandatory`] or [`Optional`]. Lookups are tried in the order they
/// were added and the first source holding the key wins.
pub struct PropertyDescriptor<T, P: Presence> {
    name: String,
    lookups: Vec<Lookup<T>>,
    converter: Converter<T>,
    default: Option<DefaultValue<T>>,
    secret: bool,
    _presence: PhantomData<fn() -> P>,
}

/// Descriptor of a property that must resolve to a value
pub type RequiredDescriptor<T> = PropertyDescriptor<T, Mandatory>;

/// Descriptor of a property that may be absent
pub type OptionalDescriptor<T> = PropertyDescriptor<T, Optional>;

impl<T: FromRaw + 'static> PropertyDescriptor<T, Mandatory> {
    /// Mandatory property using the built-in conversion for `T`
    pub fn required(name: impl Into<String>) -> Self {
        Self::with_converter(name, Converter::native())
    }
}

impl<T: FromRaw + 'static> PropertyDescriptor<T, Optional> {
    /// Optional property using the built-in conversion for `T`
    pub fn optional(name: impl Into<String>) -> Self {
        Self::with_converter(name, Converter::native())
    }
}

impl<T: 'static, P: Presence> PropertyDescriptor<T, P> {
    /// Property with an explicit converter, for types without [`FromRaw`]
    pub fn with_converter(name: impl Into<String>, converter: Converter<T>) -> Self {
        Self {
            name: name.into(),
            lookups: Vec::new(),
            converter,
            default: None,
            secret: false,
            _presence: PhantomData,
        }
    }

    /// Look for `key` in `source`, after all previously added lookups
    pub fn from(mut self, source: &SourceRef, key: impl Into<String>) -> Self {
        self.lookups.push(Lookup {
            source: Arc::clone(source),
            key: key.into(),
            converter: None,
        });
        self
    }

    /// Like [`from`](Self::from) with a converter used for this source only
    pub fn from_converted(
        mut self,
        source: &SourceRef,
        key: impl Into<String>,
        converter: Converter<T>,
    ) -> Self {
        self.lookups.push(Lookup {
            source: Arc::clone(source),
            key: key.into(),
            converter: Some(converter),
        });
        self
    }

    /// Replace the converter used for lookups without their own
    pub fn convert_with(mut self, converter: Converter<T>) -> Self {
        self.converter = converter;
        self
    }

    /// Read the raw value as `R`, then map it through `f`
    pub fn convert_from<R, E, F>(self, f: F) -> Self
    where
        R: FromRaw + 'static,
        E: fmt::Display + 'static,
        F: Fn(R) -> Result<T, E> + Send + Sync + 'static,
    {
        self.convert_with(Converter::via(f))
    }

    /// Value used when no source holds the property
    pub fn default_value(mut self, value: T) -> Self {
        self.default = Some(DefaultValue::Static(value));
        self
    }

    /// Default computed from sibling properties on first use
    pub fn default_with<F>(mut self, compute: F) -> Self
    where
        F: Fn(&Siblings) -> ConfigResult<T> + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Computed(Arc::new(compute)));
        self
    }

    /// Hide the value in reports and logs
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lookups(&self) -> &[Lookup<T>] {
        &self.lookups
    }

    pub fn is_mandatory(&self) -> bool {
        P::MANDATORY
    }

    pub fn is_secret(&self) -> bool {
        self.secret
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub(crate) fn into_spec(self) -> PropertySpec<T> {
        PropertySpec {
            name: self.name,
            lookups: self.lookups,
            converter: self.converter,
            default: self.default,
            mandatory: P::MANDATORY,
            secret: self.secret,
        }
    }
}

impl<T, P: Presence> fmt::Debug for PropertyDescriptor<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("lookups", &self.lookups)
            .field("mandatory", &P::MANDATORY)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Descriptor with the presence marker erased, as stored in a group
pub(crate) struct PropertySpec<T> {
    pub name: String,
    pub lookups: Vec<Lookup<T>>,
    pub converter: Converter<T>,
    pub default: Option<DefaultValue<T>>,
    pub mandatory: bool,
    pub secret: bool,
}

impl<T> PropertySpec<T> {
    pub fn searched(&self) -> Vec<String> {
        self.lookups.iter().map(Lookup::describe).collect()
    }
}
