//! Source assembly
//!
//! [`SourceLoader`] turns the usual inputs (environment, a current YAML or
//! JSON file, a legacy properties file, the built-in reference defaults)
//! into a [`SourceSet`] that configuration groups bind their lookups to.

use crate::error::ConfigResult;
use crate::source::{LayeredSource, MapSource, RawValue, Source, SourceRef};
use crate::stores::{EnvSource, PropertiesSource, TreeSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Built-in defaults, lowest precedence
pub const REFERENCE_YAML: &str = include_str!("reference.yaml");

pub const CURRENT_TIER: &str = "current";
pub const LEGACY_TIER: &str = "legacy";
pub const REFERENCE_TIER: &str = "reference";

/// Parse the embedded reference defaults
pub fn reference_source() -> ConfigResult<SourceRef> {
    Ok(Arc::new(TreeSource::from_yaml_str(REFERENCE_TIER, REFERENCE_YAML)?))
}

/// The three configuration tiers, highest precedence first
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub current: SourceRef,
    pub legacy: SourceRef,
    pub reference: SourceRef,
}

/// Where a key was found, see [`SourceSet::locate`]
#[derive(Debug, Clone, PartialEq)]
pub struct KeyLocation {
    pub tier: &'static str,
    pub source_name: String,
    pub value: RawValue,
}

impl SourceSet {
    /// Empty current and legacy tiers over the reference defaults
    pub fn reference_only() -> ConfigResult<Self> {
        Ok(Self {
            current: MapSource::new(CURRENT_TIER).shared(),
            legacy: MapSource::new(LEGACY_TIER).shared(),
            reference: reference_source()?,
        })
    }

    pub fn tiers(&self) -> [(&'static str, &SourceRef); 3] {
        [
            (CURRENT_TIER, &self.current),
            (LEGACY_TIER, &self.legacy),
            (REFERENCE_TIER, &self.reference),
        ]
    }

    /// Every tier holding `key` under that exact name, in precedence order
    ///
    /// Properties may read other keys from some tiers; see
    /// [`PropertyGroup::trace_key`](crate::group::PropertyGroup::trace_key)
    /// for what resolution actually uses.
    pub fn locate(&self, key: &str) -> Vec<KeyLocation> {
        self.tiers()
            .into_iter()
            .filter_map(|(tier, source)| {
                source.lookup(key).map(|value| KeyLocation {
                    tier,
                    source_name: source.name().to_string(),
                    value,
                })
            })
            .collect()
    }
}

/// Builds a [`SourceSet`]
#[derive(Debug, Clone)]
pub struct SourceLoader {
    env: bool,
    env_prefix: Option<String>,
    current_file: Option<PathBuf>,
    legacy_file: Option<PathBuf>,
    reference: bool,
}

impl SourceLoader {
    /// Environment overrides on, no files, reference defaults on
    pub fn new() -> Self {
        Self {
            env: true,
            env_prefix: None,
            current_file: None,
            legacy_file: None,
            reference: true,
        }
    }

    /// Read environment overrides as `PREFIX_JICOFO_XMPP_...`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Current configuration document (`.json` or YAML)
    pub fn current_file(mut self, path: impl AsRef<Path>) -> Self {
        self.current_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Legacy properties file
    pub fn legacy_file(mut self, path: impl AsRef<Path>) -> Self {
        self.legacy_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Whether the built-in reference defaults form the last tier
    pub fn with_reference(mut self, enabled: bool) -> Self {
        self.reference = enabled;
        self
    }

    /// Read every configured input
    ///
    /// Files that were named but cannot be read or parsed are errors.
    pub fn load(&self) -> ConfigResult<SourceSet> {
        let mut layers: Vec<SourceRef> = Vec::new();

        if self.env {
            let env = match &self.env_prefix {
                Some(prefix) => EnvSource::with_prefix(prefix.clone()),
                None => EnvSource::new(),
            };
            log::debug!("Using environment overrides from {}", env.name());
            layers.push(Arc::new(env));
        }

        if let Some(path) = &self.current_file {
            log::info!("Loading configuration from {}", path.display());
            layers.push(Arc::new(TreeSource::from_file("file", path)?));
        }

        let legacy: SourceRef = match &self.legacy_file {
            Some(path) => {
                log::info!("Loading legacy properties from {}", path.display());
                Arc::new(PropertiesSource::from_file(LEGACY_TIER, path)?)
            }
            None => MapSource::new(LEGACY_TIER).shared(),
        };

        let reference = if self.reference {
            reference_source()?
        } else {
            MapSource::new(REFERENCE_TIER).shared()
        };

        Ok(SourceSet {
            current: Arc::new(LayeredSource::new(CURRENT_TIER, layers)),
            legacy,
            reference,
        })
    }
}

impl Default for SourceLoader {
    fn default() -> Self {
        Self::new()
    }
}
