//! XMPP configuration demo
//!
//! Loads a current YAML file and a legacy properties file, then prints the
//! resolved client connection.

use focus_config::{ConfigError, ConfigResult, SourceLoader, XmppConfig};
use std::fs;
use tempfile::TempDir;

fn main() -> ConfigResult<()> {
    println!("🚀 Focus XMPP Configuration Demo");

    let temp_dir = TempDir::new().map_err(|e| ConfigError::source_load("demo", e))?;

    let current = temp_dir.path().join("jicofo.yaml");
    fs::write(
        &current,
        r#"
jicofo:
  xmpp:
    client:
      hostname: xmpp.meet.example.com
      domain: auth.meet.example.com
      username: focus
"#,
    )
    .map_err(|e| ConfigError::source_load("demo", e))?;

    let legacy = temp_dir.path().join("sip-communicator.properties");
    fs::write(
        &legacy,
        "org.jitsi.jicofo.XMPP_DOMAIN=meet.example.com\norg.jitsi.jicofo.FOCUS_USER_PASSWORD=changeme\n",
    )
    .map_err(|e| ConfigError::source_load("demo", e))?;

    let sources = SourceLoader::new()
        .without_env()
        .current_file(&current)
        .legacy_file(&legacy)
        .load()?;
    let config = XmppConfig::new(&sources)?;
    config.check()?;

    println!("✅ {}", config.client);
    println!("   XMPP domain: {}", config.client.xmpp_domain()?);
    println!("   Conference MUC: {}", config.client.conference_muc_jid()?);

    for (group, statuses) in config.report() {
        println!("\n📋 {}", group);
        for status in statuses {
            println!("   {} => {:?}", status.name, status.state);
        }
    }

    Ok(())
}
