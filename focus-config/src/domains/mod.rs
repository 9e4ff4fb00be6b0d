//! Domain-specific configuration groups

pub mod identifiers;
pub mod xmpp;

pub use identifiers::{DomainJid, IdentifierError, Resourcepart};
pub use xmpp::{
    ClientSettings, ConnectionSettings, XmppClientConnectionConfig, XmppConfig,
    XmppConnectionConfig, XmppServiceConnectionConfig,
};
