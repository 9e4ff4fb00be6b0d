//! Typed, lazily resolved configuration properties
//!
//! Properties are declared with a [`PropertyDescriptor`]: an ordered list of
//! `(source, key)` lookups, a conversion and an optional default. Registering
//! a descriptor with a [`PropertyGroup`] yields a [`Property`] handle that
//! resolves on first use and caches the outcome, value or error, for the
//! lifetime of the group.
//!
//! The XMPP connection groups in [`domains::xmpp`] are built on top of this.

pub mod cell;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod group;
pub mod loader;
pub mod source;
pub mod stores;

// Domain-specific configuration groups
pub mod domains;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export main types
pub use convert::{ConversionFailure, Converter, FromRaw};
pub use descriptor::{
    DefaultValue, Lookup, Mandatory, Optional, OptionalDescriptor, Presence, PropertyDescriptor,
    RequiredDescriptor,
};
pub use error::{ConfigError, ConfigResult};
pub use group::{
    LookupTrace, OptionalProperty, Property, PropertyGroup, PropertyState, PropertyStatus,
    PropertyTrace, PropertyValue, RequiredProperty, Siblings,
};
pub use loader::{KeyLocation, SourceLoader, SourceSet};
pub use source::{LayeredSource, MapSource, RawValue, Source, SourceRef};
pub use stores::{EnvSource, PropertiesSource, TreeSource};

// Re-export domain configurations
pub use domains::{
    DomainJid, Resourcepart, XmppClientConnectionConfig, XmppConfig, XmppConnectionConfig,
    XmppServiceConnectionConfig,
};
