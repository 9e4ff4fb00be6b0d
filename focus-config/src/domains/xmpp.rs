//! XMPP connection configuration
//!
//! Jicofo keeps two XMPP connections: the *service* connection (to a
//! component-facing server, off by default) and the *client* connection used
//! to log in and join conferences. Both share one set of connection
//! properties; the client adds the top-level XMPP domain, the conference MUC
//! domain and an optional client proxy, and falls back to the legacy
//! properties file for the settings that used to live there.

use crate::descriptor::{OptionalDescriptor, Presence, PropertyDescriptor, RequiredDescriptor};
use crate::domains::identifiers::{DomainJid, Resourcepart};
use crate::error::ConfigResult;
use crate::group::{OptionalProperty, PropertyGroup, PropertyStatus, PropertyTrace, RequiredProperty};
use crate::loader::SourceSet;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

pub const SERVICE_NAMESPACE: &str = "jicofo.xmpp.service";
pub const CLIENT_NAMESPACE: &str = "jicofo.xmpp.client";

pub const LEGACY_HOSTNAME: &str = "org.jitsi.jicofo.HOSTNAME";
pub const LEGACY_DOMAIN: &str = "org.jitsi.jicofo.FOCUS_USER_DOMAIN";
pub const LEGACY_USERNAME: &str = "org.jitsi.jicofo.FOCUS_USER_NAME";
pub const LEGACY_PASSWORD: &str = "org.jitsi.jicofo.FOCUS_USER_PASSWORD";
/// Read from both the current and the legacy tier under this name
pub const LEGACY_XMPP_DOMAIN: &str = "org.jitsi.jicofo.XMPP_DOMAIN";

/// Legacy keys for the shared connection properties
#[derive(Debug, Clone, Copy)]
struct LegacyKeys {
    hostname: &'static str,
    domain: &'static str,
    username: &'static str,
    password: &'static str,
}

const CLIENT_LEGACY_KEYS: LegacyKeys = LegacyKeys {
    hostname: LEGACY_HOSTNAME,
    domain: LEGACY_DOMAIN,
    username: LEGACY_USERNAME,
    password: LEGACY_PASSWORD,
};

/// What the networking layer reads from either connection group
pub trait XmppConnectionConfig {
    fn group(&self) -> &PropertyGroup;
    fn enabled(&self) -> ConfigResult<bool>;
    fn hostname(&self) -> ConfigResult<String>;
    fn port(&self) -> ConfigResult<u16>;
    /// Domain used for login; not necessarily the server's root domain
    fn domain(&self) -> ConfigResult<DomainJid>;
    fn username(&self) -> ConfigResult<Resourcepart>;
    fn password(&self) -> ConfigResult<Option<String>>;
    fn reply_timeout(&self) -> ConfigResult<Duration>;
    fn disable_certificate_verification(&self) -> ConfigResult<bool>;

    /// Resolve every connection property into a plain snapshot
    fn connection_settings(&self) -> ConfigResult<ConnectionSettings> {
        Ok(ConnectionSettings {
            enabled: self.enabled()?,
            hostname: self.hostname()?,
            port: self.port()?,
            domain: self.domain()?,
            username: self.username()?,
            password: self.password()?,
            reply_timeout: self.reply_timeout()?,
            disable_certificate_verification: self.disable_certificate_verification()?,
        })
    }
}

/// Adds the current, legacy and reference lookups for `name`, in that order
fn tiered<T: 'static, P: Presence>(
    descriptor: PropertyDescriptor<T, P>,
    group: &PropertyGroup,
    sources: &SourceSet,
    legacy_key: Option<&str>,
) -> PropertyDescriptor<T, P> {
    let key = group.key(descriptor.name());
    let descriptor = descriptor.from(&sources.current, key.clone());
    let descriptor = match legacy_key {
        Some(legacy_key) => descriptor.from(&sources.legacy, legacy_key),
        None => descriptor,
    };
    descriptor.from(&sources.reference, key)
}

/// Handles for the properties both groups share
#[derive(Debug, Clone)]
struct ConnectionProperties {
    group: PropertyGroup,
    enabled: RequiredProperty<bool>,
    hostname: RequiredProperty<String>,
    port: RequiredProperty<u16>,
    domain: RequiredProperty<DomainJid>,
    username: RequiredProperty<Resourcepart>,
    password: OptionalProperty<String>,
    reply_timeout: RequiredProperty<Duration>,
    disable_certificate_verification: RequiredProperty<bool>,
}

impl ConnectionProperties {
    fn register(
        name: &str,
        namespace: &str,
        sources: &SourceSet,
        legacy: Option<LegacyKeys>,
    ) -> ConfigResult<Self> {
        let group = PropertyGroup::new(name, namespace);
        let g = &group;

        let enabled = g.register(tiered(RequiredDescriptor::<bool>::required("enabled"), g, sources, None))?;
        let hostname = g.register(tiered(
            RequiredDescriptor::<String>::required("hostname"),
            g,
            sources,
            legacy.map(|keys| keys.hostname),
        ))?;
        let port = g.register(tiered(RequiredDescriptor::<u16>::required("port"), g, sources, None))?;
        let domain = g.register(tiered(
            RequiredDescriptor::<DomainJid>::required("domain"),
            g,
            sources,
            legacy.map(|keys| keys.domain),
        ))?;
        let username = g.register(tiered(
            RequiredDescriptor::<Resourcepart>::required("username"),
            g,
            sources,
            legacy.map(|keys| keys.username),
        ))?;
        let password = g.register(
            tiered(
                OptionalDescriptor::<String>::optional("password"),
                g,
                sources,
                legacy.map(|keys| keys.password),
            )
            .secret(),
        )?;
        let reply_timeout = g.register(tiered(
            RequiredDescriptor::<Duration>::required("reply-timeout"),
            g,
            sources,
            None,
        ))?;
        let disable_certificate_verification = g.register(tiered(
            RequiredDescriptor::<bool>::required("disable-certificate-verification"),
            g,
            sources,
            None,
        ))?;

        Ok(Self {
            group,
            enabled,
            hostname,
            port,
            domain,
            username,
            password,
            reply_timeout,
            disable_certificate_verification,
        })
    }
}

macro_rules! delegate_connection_config {
    ($ty:ty) => {
        impl XmppConnectionConfig for $ty {
            fn group(&self) -> &PropertyGroup {
                &self.connection.group
            }

            fn enabled(&self) -> ConfigResult<bool> {
                self.connection.enabled.resolve()
            }

            fn hostname(&self) -> ConfigResult<String> {
                self.connection.hostname.resolve()
            }

            fn port(&self) -> ConfigResult<u16> {
                self.connection.port.resolve()
            }

            fn domain(&self) -> ConfigResult<DomainJid> {
                self.connection.domain.resolve()
            }

            fn username(&self) -> ConfigResult<Resourcepart> {
                self.connection.username.resolve()
            }

            fn password(&self) -> ConfigResult<Option<String>> {
                self.connection.password.resolve()
            }

            fn reply_timeout(&self) -> ConfigResult<Duration> {
                self.connection.reply_timeout.resolve()
            }

            fn disable_certificate_verification(&self) -> ConfigResult<bool> {
                self.connection.disable_certificate_verification.resolve()
            }
        }
    };
}

/// `Name[hostname=…, port=…, username=…]`; unresolvable values show as
/// `<invalid>`
fn describe_connection(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    config: &dyn XmppConnectionConfig,
) -> fmt::Result {
    fn shown<T: fmt::Display>(value: ConfigResult<T>) -> String {
        value
            .map(|v| v.to_string())
            .unwrap_or_else(|_| "<invalid>".to_string())
    }

    write!(
        f,
        "{}[hostname={}, port={}, username={}]",
        name,
        shown(config.hostname()),
        shown(config.port()),
        shown(config.username())
    )
}

/// Service connection, namespace `jicofo.xmpp.service`
#[derive(Debug, Clone)]
pub struct XmppServiceConnectionConfig {
    connection: ConnectionProperties,
}

impl XmppServiceConnectionConfig {
    pub fn new(sources: &SourceSet) -> ConfigResult<Self> {
        Ok(Self {
            connection: ConnectionProperties::register("service", SERVICE_NAMESPACE, sources, None)?,
        })
    }
}

delegate_connection_config!(XmppServiceConnectionConfig);

impl fmt::Display for XmppServiceConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe_connection(f, "XmppServiceConnectionConfig", self)
    }
}

/// Client connection, namespace `jicofo.xmpp.client`
#[derive(Debug, Clone)]
pub struct XmppClientConnectionConfig {
    connection: ConnectionProperties,
    xmpp_domain: RequiredProperty<DomainJid>,
    conference_muc_jid: RequiredProperty<DomainJid>,
    client_proxy: OptionalProperty<DomainJid>,
}

impl XmppClientConnectionConfig {
    pub fn new(sources: &SourceSet) -> ConfigResult<Self> {
        let connection =
            ConnectionProperties::register("client", CLIENT_NAMESPACE, sources, Some(CLIENT_LEGACY_KEYS))?;
        let group = &connection.group;

        let xmpp_domain = group.register(
            RequiredDescriptor::<DomainJid>::required("xmpp-domain")
                .from(&sources.current, LEGACY_XMPP_DOMAIN)
                .from(&sources.legacy, LEGACY_XMPP_DOMAIN),
        )?;

        let conference_muc_jid = group.register(
            RequiredDescriptor::<DomainJid>::required("conference-muc-jid")
                .from(&sources.current, group.key("conference-muc-jid"))
                .default_with(|siblings| {
                    let xmpp_domain: DomainJid = siblings.require("xmpp-domain")?;
                    Ok(xmpp_domain.subdomain("conference")?)
                }),
        )?;

        let client_proxy = group.register(
            OptionalDescriptor::<DomainJid>::optional("client-proxy")
                .from(&sources.current, group.key("client-proxy")),
        )?;

        Ok(Self {
            connection,
            xmpp_domain,
            conference_muc_jid,
            client_proxy,
        })
    }

    /// Top-level domain hosted by the XMPP server; not necessarily the login
    /// domain
    pub fn xmpp_domain(&self) -> ConfigResult<DomainJid> {
        self.xmpp_domain.resolve()
    }

    /// MUC service for conference rooms; `conference.<xmpp-domain>` unless
    /// configured
    pub fn conference_muc_jid(&self) -> ConfigResult<DomainJid> {
        self.conference_muc_jid.resolve()
    }

    pub fn client_proxy(&self) -> ConfigResult<Option<DomainJid>> {
        self.client_proxy.resolve()
    }

    pub fn settings(&self) -> ConfigResult<ClientSettings> {
        Ok(ClientSettings {
            connection: self.connection_settings()?,
            xmpp_domain: self.xmpp_domain()?,
            conference_muc_jid: self.conference_muc_jid()?,
            client_proxy: self.client_proxy()?,
        })
    }
}

delegate_connection_config!(XmppClientConnectionConfig);

impl fmt::Display for XmppClientConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe_connection(f, "XmppClientConnectionConfig", self)
    }
}

fn serialize_duration<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_duration(*duration))
}

/// Resolved connection values handed to the networking layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionSettings {
    pub enabled: bool,
    pub hostname: String,
    pub port: u16,
    pub domain: DomainJid,
    pub username: Resourcepart,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(serialize_with = "serialize_duration")]
    pub reply_timeout: Duration,
    pub disable_certificate_verification: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientSettings {
    #[serde(flatten)]
    pub connection: ConnectionSettings,
    pub xmpp_domain: DomainJid,
    pub conference_muc_jid: DomainJid,
    pub client_proxy: Option<DomainJid>,
}

/// Both XMPP connection groups, built from one set of sources
#[derive(Debug, Clone)]
pub struct XmppConfig {
    pub service: XmppServiceConnectionConfig,
    pub client: XmppClientConnectionConfig,
}

impl XmppConfig {
    pub fn new(sources: &SourceSet) -> ConfigResult<Self> {
        Ok(Self {
            service: XmppServiceConnectionConfig::new(sources)?,
            client: XmppClientConnectionConfig::new(sources)?,
        })
    }

    /// Fail fast on a misconfigured connection
    ///
    /// The client group is always checked. The service group is only
    /// checked when it is enabled, since it has no usable defaults for its
    /// domain and username.
    pub fn check(&self) -> ConfigResult<()> {
        self.client.group().check()?;

        if self.service.enabled()? {
            self.service.group().check()?;
        } else {
            log::debug!("XMPP service connection disabled, skipping its checks");
        }
        Ok(())
    }

    pub fn groups(&self) -> [&PropertyGroup; 2] {
        [self.service.group(), self.client.group()]
    }

    /// Trace the property reading `key` in either group, service first
    pub fn trace(&self, key: &str) -> Option<PropertyTrace> {
        self.groups().iter().find_map(|group| group.trace_key(key))
    }

    /// Per-group property reports, service first
    pub fn report(&self) -> Vec<(String, Vec<PropertyStatus>)> {
        self.groups()
            .iter()
            .map(|group| (group.name().to_string(), group.report()))
            .collect()
    }
}
