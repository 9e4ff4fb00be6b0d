//! Configuration groups
//!
//! A [`PropertyGroup`] owns the resolved cells for a namespaced bundle of
//! properties. Registering a descriptor returns a typed [`Property`] handle;
//! nothing is looked up until the handle is first resolved.
//!
//! Computed defaults read other properties of the same group through
//! [`Siblings`]. All first-time resolutions in a group share one
//! [`ResolutionScope`], which makes concurrent first access resolve each
//! property once and turns dependency cycles into
//! [`ConfigError::CyclicDefault`].

use crate::cell::{Memo, ResolutionScope};
use crate::descriptor::{DefaultValue, Mandatory, Optional, Presence, PropertyDescriptor, PropertySpec};
use crate::error::{ConfigError, ConfigResult};
use crate::source::{display_raw, RawValue};
use parking_lot::RwLock;
use serde::Serialize;
use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

/// Bounds every property value type satisfies
pub trait PropertyValue: Clone + fmt::Debug + Send + Sync + 'static {}

impl<T: Clone + fmt::Debug + Send + Sync + 'static> PropertyValue for T {}

const REDACTED: &str = "********";

/// Outcome of a property, as shown in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PropertyState {
    Resolved { value: String },
    Absent,
    Failed { error: String },
}

/// One line of a group report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyStatus {
    pub name: String,
    pub mandatory: bool,
    pub searched: Vec<String>,
    #[serde(flatten)]
    pub state: PropertyState,
}

/// One lookup of a [`PropertyTrace`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupTrace {
    pub key: String,
    /// Source name, narrowed to the answering layer when the key is present
    pub source_name: String,
    /// Raw value as written, `********` for secrets; `None` if not present
    pub value: Option<String>,
}

/// What every lookup of a property currently holds, in precedence order
///
/// Built from the sources directly; tracing never resolves or caches the
/// property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyTrace {
    pub group: String,
    pub name: String,
    pub secret: bool,
    pub lookups: Vec<LookupTrace>,
    pub has_default: bool,
}

impl PropertyTrace {
    /// Index of the lookup resolution takes its value from
    pub fn winner(&self) -> Option<usize> {
        self.lookups.iter().position(|lookup| lookup.value.is_some())
    }
}

/// Type-erased view of a registered property
trait ErasedProperty: Send + Sync {
    fn name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
    fn is_mandatory(&self) -> bool;
    /// Whether any lookup reads `key`
    fn reads_key(&self, key: &str) -> bool;
    fn trace(&self) -> PropertyTrace;
    /// Resolve (if needed) and describe the outcome
    fn status(&self) -> PropertyStatus;
    /// Resolve (if needed) and report only the error, if any
    fn check(&self) -> ConfigResult<()>;
}

struct GroupInner {
    name: String,
    namespace: String,
    scope: ResolutionScope,
    properties: RwLock<Vec<Arc<dyn ErasedProperty>>>,
}

impl GroupInner {
    fn find(&self, name: &str) -> Option<Arc<dyn ErasedProperty>> {
        self.properties
            .read()
            .iter()
            .find(|property| property.name() == name)
            .cloned()
    }
}

/// Resolved cell plus everything needed to fill it
struct PropertyCell<T> {
    spec: PropertySpec<T>,
    memo: Memo<Option<T>>,
    group: Weak<GroupInner>,
    group_name: String,
}

impl<T: PropertyValue> PropertyCell<T> {
    fn resolve(&self) -> ConfigResult<Option<T>> {
        if let Some(outcome) = self.memo.get() {
            return outcome.clone();
        }

        let group = self
            .group
            .upgrade()
            .ok_or_else(|| ConfigError::GroupUnavailable(self.group_name.clone()))?;
        self.memo.get_or_resolve(&group.scope, || self.compute())
    }

    /// The resolution algorithm; runs at most once per cell
    fn compute(&self) -> ConfigResult<Option<T>> {
        let spec = &self.spec;

        for lookup in &spec.lookups {
            log::trace!("{}: looking up {}", spec.name, lookup.describe());
            let raw = match lookup.source.lookup(&lookup.key) {
                Some(RawValue::Null) | None => continue,
                Some(raw) => raw,
            };

            let converter = lookup.converter.as_ref().unwrap_or(&spec.converter);
            return match converter.apply(&raw) {
                Ok(value) => {
                    if lookup.source.is_legacy() {
                        log::warn!(
                            "{}.{}: using deprecated {}; move it to the current configuration",
                            self.group_name,
                            spec.name,
                            lookup.describe()
                        );
                    }
                    log::debug!(
                        "{}.{}: resolved from {} = {}",
                        self.group_name,
                        spec.name,
                        lookup.describe(),
                        self.render(&value)
                    );
                    Ok(Some(value))
                }
                Err(failure) => Err(ConfigError::Conversion {
                    property: spec.name.clone(),
                    key: lookup.key.clone(),
                    source_name: lookup.source.origin(&lookup.key),
                    raw: if spec.secret {
                        REDACTED.to_string()
                    } else {
                        display_raw(&raw)
                    },
                    reason: failure.to_string(),
                }),
            };
        }

        match &spec.default {
            Some(DefaultValue::Static(value)) => {
                log::debug!("{}.{}: using default", self.group_name, spec.name);
                Ok(Some(value.clone()))
            }
            Some(DefaultValue::Computed(compute)) => {
                log::debug!("{}.{}: computing default", self.group_name, spec.name);
                let siblings = Siblings {
                    group: self.group.clone(),
                    group_name: self.group_name.clone(),
                };
                compute(&siblings).map(Some)
            }
            None if spec.mandatory => Err(ConfigError::MissingRequiredProperty {
                property: spec.name.clone(),
                searched: spec.searched(),
            }),
            None => {
                log::debug!("{}.{}: not configured", self.group_name, spec.name);
                Ok(None)
            }
        }
    }

    fn render(&self, value: &T) -> String {
        if self.spec.secret {
            REDACTED.to_string()
        } else {
            format!("{:?}", value)
        }
    }
}

impl<T: PropertyValue> ErasedProperty for PropertyCell<T> {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn is_mandatory(&self) -> bool {
        self.spec.mandatory
    }

    fn status(&self) -> PropertyStatus {
        let state = match self.resolve() {
            Ok(Some(value)) => PropertyState::Resolved {
                value: self.render(&value),
            },
            Ok(None) => PropertyState::Absent,
            Err(error) => PropertyState::Failed {
                error: error.to_string(),
            },
        };

        PropertyStatus {
            name: self.spec.name.clone(),
            mandatory: self.spec.mandatory,
            searched: self.spec.searched(),
            state,
        }
    }

    fn check(&self) -> ConfigResult<()> {
        self.resolve().map(|_| ())
    }

    fn reads_key(&self, key: &str) -> bool {
        self.spec.lookups.iter().any(|lookup| lookup.key == key)
    }

    fn trace(&self) -> PropertyTrace {
        let lookups = self
            .spec
            .lookups
            .iter()
            .map(|lookup| match lookup.source.lookup(&lookup.key) {
                Some(RawValue::Null) | None => LookupTrace {
                    key: lookup.key.clone(),
                    source_name: lookup.source.name().to_string(),
                    value: None,
                },
                Some(raw) => LookupTrace {
                    key: lookup.key.clone(),
                    source_name: lookup.source.origin(&lookup.key),
                    value: Some(if self.spec.secret {
                        REDACTED.to_string()
                    } else {
                        display_raw(&raw)
                    }),
                },
            })
            .collect();

        PropertyTrace {
            group: self.group_name.clone(),
            name: self.spec.name.clone(),
            secret: self.spec.secret,
            lookups,
            has_default: self.spec.default.is_some(),
        }
    }
}

/// Typed handle to a registered property
///
/// Cloning the handle shares the cell; the value is resolved once no matter
/// which clone asks first.
pub struct Property<T, P: Presence> {
    cell: Arc<PropertyCell<T>>,
    _presence: PhantomData<fn() -> P>,
}

/// Handle to a property that must resolve to a value
pub type RequiredProperty<T> = Property<T, Mandatory>;

/// Handle to a property that may be absent
pub type OptionalProperty<T> = Property<T, Optional>;

impl<T: PropertyValue, P: Presence> Property<T, P> {
    pub fn name(&self) -> &str {
        &self.cell.spec.name
    }

    /// `key@source` for every lookup, in precedence order
    pub fn searched(&self) -> Vec<String> {
        self.cell.spec.searched()
    }

    /// Resolve the property, or return the cached outcome
    pub fn resolve(&self) -> ConfigResult<P::Output<T>> {
        let value = self.cell.resolve()?;
        P::finish(value, self.name())
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.memo.is_resolved()
    }

    /// Resolve and describe the outcome
    pub fn status(&self) -> PropertyStatus {
        self.cell.status()
    }
}

impl<T, P: Presence> Clone for Property<T, P> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _presence: PhantomData,
        }
    }
}

impl<T, P: Presence> fmt::Debug for Property<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("group", &self.cell.group_name)
            .field("name", &self.cell.spec.name)
            .field("mandatory", &P::MANDATORY)
            .finish()
    }
}

/// Read access to the other properties of a group, handed to computed
/// defaults
pub struct Siblings {
    group: Weak<GroupInner>,
    group_name: String,
}

impl Siblings {
    /// Resolve a sibling; `Ok(None)` if it is optional and not configured
    pub fn get<T: PropertyValue>(&self, name: &str) -> ConfigResult<Option<T>> {
        let group = self
            .group
            .upgrade()
            .ok_or_else(|| ConfigError::GroupUnavailable(self.group_name.clone()))?;

        let property = group.find(name).ok_or_else(|| ConfigError::UnknownProperty {
            group: self.group_name.clone(),
            property: name.to_string(),
        })?;

        let cell = property
            .as_any()
            .downcast_ref::<PropertyCell<T>>()
            .ok_or_else(|| ConfigError::TypeMismatch {
                group: self.group_name.clone(),
                property: name.to_string(),
                expected: type_name::<T>(),
            })?;

        cell.resolve()
    }

    /// Resolve a sibling that must have a value
    pub fn require<T: PropertyValue>(&self, name: &str) -> ConfigResult<T> {
        self.get(name)?.ok_or_else(|| ConfigError::AbsentValue {
            property: name.to_string(),
        })
    }
}

/// Namespaced bundle of properties with independent caches
#[derive(Clone)]
pub struct PropertyGroup {
    inner: Arc<GroupInner>,
}

impl PropertyGroup {
    /// Create an empty group; `namespace` prefixes keys built with
    /// [`key`](Self::key).
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                name: name.into(),
                namespace: namespace.into(),
                scope: ResolutionScope::new(),
                properties: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Full key for `suffix` under this group's namespace
    pub fn key(&self, suffix: &str) -> String {
        if self.inner.namespace.is_empty() {
            suffix.to_string()
        } else {
            format!("{}.{}", self.inner.namespace, suffix)
        }
    }

    /// Register a descriptor and get a lazy handle to its value
    pub fn register<T: PropertyValue, P: Presence>(
        &self,
        descriptor: PropertyDescriptor<T, P>,
    ) -> ConfigResult<Property<T, P>> {
        let mut properties = self.inner.properties.write();
        if properties.iter().any(|p| p.name() == descriptor.name()) {
            return Err(ConfigError::DuplicateProperty {
                group: self.inner.name.clone(),
                property: descriptor.name().to_string(),
            });
        }

        let spec = descriptor.into_spec();
        let cell = Arc::new(PropertyCell {
            memo: Memo::new(format!("{}.{}", self.inner.name, spec.name)),
            spec,
            group: Arc::downgrade(&self.inner),
            group_name: self.inner.name.clone(),
        });
        properties.push(cell.clone());

        Ok(Property {
            cell,
            _presence: PhantomData,
        })
    }

    /// Names of registered properties, in registration order
    pub fn property_names(&self) -> Vec<String> {
        self.inner
            .properties
            .read()
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Trace the property named by `key`
    ///
    /// `key` is either the namespaced property key (`namespace.name`) or
    /// any key one of its lookups reads, such as a legacy key.
    pub fn trace_key(&self, key: &str) -> Option<PropertyTrace> {
        let properties = self.snapshot();
        properties
            .iter()
            .find(|p| self.key(p.name()) == key)
            .or_else(|| properties.iter().find(|p| p.reads_key(key)))
            .map(|p| p.trace())
    }

    fn snapshot(&self) -> Vec<Arc<dyn ErasedProperty>> {
        self.inner.properties.read().clone()
    }

    /// Resolve every property and describe the outcomes
    pub fn report(&self) -> Vec<PropertyStatus> {
        self.snapshot().iter().map(|p| p.status()).collect()
    }

    /// Resolve every mandatory property, failing on the first error
    ///
    /// Meant to run at startup so a misconfigured service refuses to start
    /// with an error naming the property instead of failing later on use.
    pub fn check(&self) -> ConfigResult<()> {
        for property in self.snapshot().iter().filter(|p| p.is_mandatory()) {
            property.check()?;
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyGroup")
            .field("name", &self.inner.name)
            .field("namespace", &self.inner.namespace)
            .field("properties", &self.property_names())
            .finish()
    }
}
