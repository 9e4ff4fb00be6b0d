//! XMPP identifier types used by the connection groups

use crate::convert::{ConversionFailure, FromRaw};
use crate::error::ConfigError;
use crate::source::RawValue;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Longest resourcepart allowed, in bytes
pub const MAX_RESOURCEPART_BYTES: usize = 1023;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("domain must not be empty")]
    EmptyDomain,

    #[error("'{0}' is not a bare domain (contains '{1}')")]
    NotBare(String, char),

    #[error("'{input}' is not a valid domain: {reason}")]
    InvalidDomain { input: String, reason: String },

    #[error("resourcepart must not be empty")]
    EmptyResourcepart,

    #[error("resourcepart is {0} bytes, the limit is 1023")]
    ResourcepartTooLong(usize),

    #[error("resourcepart contains control character U+{0:04X}")]
    ControlCharacter(u32),
}

impl From<IdentifierError> for ConfigError {
    fn from(err: IdentifierError) -> Self {
        ConfigError::InvalidValue(err.to_string())
    }
}

impl From<IdentifierError> for ConversionFailure {
    fn from(err: IdentifierError) -> Self {
        ConversionFailure::new(err.to_string())
    }
}

/// Domain-only XMPP address, e.g. `conference.example.com`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DomainJid(String);

impl DomainJid {
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IdentifierError::EmptyDomain);
        }
        if let Some(c) = input.chars().find(|c| *c == '@' || *c == '/') {
            return Err(IdentifierError::NotBare(input.to_string(), c));
        }

        if input.starts_with('[') || input.parse::<Ipv4Addr>().is_ok() {
            let host = url::Host::parse(input).map_err(|e| IdentifierError::InvalidDomain {
                input: input.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Self(host.to_string()));
        }

        // names may end in a numeric label, which URL host parsing would
        // take for a malformed IPv4 address
        let ascii = idna::domain_to_ascii_strict(input).map_err(|e| IdentifierError::InvalidDomain {
            input: input.to_string(),
            reason: format!("not a valid domain name ({:?})", e),
        })?;
        Ok(Self(ascii))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `label.` + this domain
    pub fn subdomain(&self, label: &str) -> Result<Self, IdentifierError> {
        Self::parse(&format!("{}.{}", label, self.0))
    }
}

impl fmt::Display for DomainJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DomainJid {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromRaw for DomainJid {
    const TYPE_NAME: &'static str = "domain JID";

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure> {
        let text = String::from_raw(raw)?;
        Ok(Self::parse(&text)?)
    }
}

/// Resource part of an XMPP address; used as the login username
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Resourcepart(String);

impl Resourcepart {
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        if input.is_empty() {
            return Err(IdentifierError::EmptyResourcepart);
        }
        if input.len() > MAX_RESOURCEPART_BYTES {
            return Err(IdentifierError::ResourcepartTooLong(input.len()));
        }
        if let Some(c) = input.chars().find(|c| c.is_control()) {
            return Err(IdentifierError::ControlCharacter(c as u32));
        }
        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Resourcepart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Resourcepart {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl FromRaw for Resourcepart {
    const TYPE_NAME: &'static str = "resourcepart";

    fn from_raw(raw: &RawValue) -> Result<Self, ConversionFailure> {
        let text = String::from_raw(raw)?;
        Ok(Self::parse(&text)?)
    }
}
