//! Command-line interface for inspecting the resolved configuration
//!
//! `show` prints every property of both XMPP groups with its outcome,
//! `check` runs the startup checks, `lookup` walks the lookups of the
//! property reading a key and marks the one resolution takes.

use clap::{Args, Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::{
    domains::xmpp::XmppConfig,
    group::{PropertyState, PropertyStatus, PropertyTrace},
    loader::{SourceLoader, SourceSet},
    source::display_raw,
    ConfigResult,
};

/// Focus configuration inspector
#[derive(Parser, Debug)]
#[command(name = "focus")]
#[command(about = "Inspect and check the focus XMPP configuration")]
#[command(version)]
pub struct ConfigCli {
    #[command(flatten)]
    pub sources: SourceArgs,

    /// Log filter, e.g. `warn` or `focus_config=trace`; `RUST_LOG` applies
    /// when not given
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Where configuration is read from
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Current configuration file (YAML, or JSON with a `.json` extension)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Legacy properties file
    #[arg(long, global = true)]
    pub legacy: Option<PathBuf>,

    /// Prefix for environment overrides
    #[arg(long, global = true)]
    pub env_prefix: Option<String>,

    /// Ignore environment variables
    #[arg(long, global = true)]
    pub no_env: bool,
}

impl SourceArgs {
    pub fn loader(&self) -> SourceLoader {
        let mut loader = SourceLoader::new();
        if self.no_env {
            loader = loader.without_env();
        }
        if let Some(prefix) = &self.env_prefix {
            loader = loader.with_prefix(prefix.clone());
        }
        if let Some(path) = &self.config {
            loader = loader.current_file(path);
        }
        if let Some(path) = &self.legacy {
            loader = loader.legacy_file(path);
        }
        loader
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Resolve and print every property
    Show {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Resolve every mandatory property; fails on the first error
    Check,

    /// Show every source a property is looked up in and which one wins
    Lookup {
        /// Property key or legacy key, e.g. `jicofo.xmpp.client.port`
        key: String,
    },
}

/// CLI application runner
pub struct ConfigCliRunner;

impl ConfigCliRunner {
    /// Run a parsed command and return what it would print
    pub fn execute(cli: &ConfigCli) -> ConfigResult<String> {
        let sources = cli.sources.loader().load()?;

        match &cli.command {
            ConfigCommand::Show { json } => {
                let config = XmppConfig::new(&sources)?;
                if *json {
                    render_json(&config)
                } else {
                    Ok(render_report(&config))
                }
            }
            ConfigCommand::Check => {
                let config = XmppConfig::new(&sources)?;
                config.check()?;
                Ok(format!(
                    "✅ Configuration is valid\n   {}\n   {}\n",
                    config.client, config.service
                ))
            }
            ConfigCommand::Lookup { key } => {
                let config = XmppConfig::new(&sources)?;
                Ok(match config.trace(key) {
                    Some(trace) => render_trace(key, &trace),
                    None => render_locations(&sources, key),
                })
            }
        }
    }

    /// Run the CLI application, printing to stdout
    pub fn run(cli: ConfigCli) -> ConfigResult<()> {
        let output = Self::execute(&cli)?;
        print!("{}", output);
        Ok(())
    }
}

fn render_status(out: &mut String, status: &PropertyStatus) {
    let marker = if status.mandatory { "" } else { " (optional)" };
    let _ = match &status.state {
        PropertyState::Resolved { value } => {
            writeln!(out, "   {}{} = {}", status.name, marker, value)
        }
        PropertyState::Absent => writeln!(out, "   {}{} is not set", status.name, marker),
        PropertyState::Failed { error } => {
            writeln!(out, "   ❌ {}{}: {}", status.name, marker, error)
        }
    };
}

fn render_report(config: &XmppConfig) -> String {
    let mut out = String::new();
    for (group, statuses) in config.report() {
        let _ = writeln!(out, "📋 {}", group);
        for status in &statuses {
            render_status(&mut out, status);
        }
    }
    out
}

fn render_json(config: &XmppConfig) -> ConfigResult<String> {
    let mut groups = serde_json::Map::new();
    for (group, statuses) in config.report() {
        groups.insert(group, serde_json::to_value(statuses)?);
    }

    let mut rendered = serde_json::to_string_pretty(&groups)?;
    rendered.push('\n');
    Ok(rendered)
}

fn render_trace(key: &str, trace: &PropertyTrace) -> String {
    let mut out = format!("🔍 {} ({}.{})\n", key, trace.group, trace.name);
    let winner = trace.winner();

    for (index, lookup) in trace.lookups.iter().enumerate() {
        let _ = match &lookup.value {
            Some(value) => {
                let marker = if winner == Some(index) { " (wins)" } else { "" };
                writeln!(out, "   {}@{}: {}{}", lookup.key, lookup.source_name, value, marker)
            }
            None => writeln!(out, "   {}@{}: not set", lookup.key, lookup.source_name),
        };
    }

    if winner.is_none() {
        let _ = if trace.has_default {
            writeln!(out, "   default applies")
        } else {
            writeln!(out, "   no value and no default")
        };
    }
    out
}

/// Raw tier contents for keys no property reads; no winner is claimed
fn render_locations(sources: &SourceSet, key: &str) -> String {
    let found = sources.locate(key);
    if found.is_empty() {
        return format!("🔍 {} is not set in any tier\n", key);
    }

    let mut out = format!("🔍 {} (not read by any property)\n", key);
    for location in &found {
        let _ = writeln!(
            out,
            "   {} [{}]: {}",
            location.tier,
            location.source_name,
            display_raw(&location.value)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("jicofo.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    const VALID: &str = r#"
jicofo:
  xmpp:
    client:
      domain: auth.example.com
      username: focus
      password: hunter2
org.jitsi.jicofo.XMPP_DOMAIN: example.com
"#;

    #[test]
    fn test_cli_parsing() {
        let cli = ConfigCli::try_parse_from([
            "focus",
            "show",
            "--json",
            "--config",
            "jicofo.yaml",
            "--no-env",
        ])
        .unwrap();

        assert!(matches!(cli.command, ConfigCommand::Show { json: true }));
        assert_eq!(cli.sources.config, Some(PathBuf::from("jicofo.yaml")));
        assert!(cli.sources.no_env);
        assert_eq!(cli.log_level, None);

        let cli = ConfigCli::try_parse_from([
            "focus",
            "--legacy",
            "sip-communicator.properties",
            "--env-prefix",
            "FOCUS",
            "lookup",
            "jicofo.xmpp.client.port",
        ])
        .unwrap();
        match cli.command {
            ConfigCommand::Lookup { key } => assert_eq!(key, "jicofo.xmpp.client.port"),
            other => panic!("Expected Lookup command, got {:?}", other),
        }
        assert_eq!(cli.log_level, None);

        let cli = ConfigCli::try_parse_from(["focus", "check", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.sources.env_prefix.as_deref(), Some("FOCUS"));
    }

    #[test]
    fn test_check_command() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, VALID);
        let cli = ConfigCli::try_parse_from([
            "focus",
            "--no-env",
            "--config",
            path.to_str().unwrap(),
            "check",
        ])
        .unwrap();

        let output = ConfigCliRunner::execute(&cli).unwrap();
        assert!(output.contains("XmppClientConnectionConfig[hostname=localhost, port=5222, username=focus]"));
    }

    #[test]
    fn test_check_command_fails_without_domain() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "jicofo:\n  xmpp:\n    client:\n      username: focus\n");
        let cli = ConfigCli::try_parse_from(["focus", "--no-env", "-c", path.to_str().unwrap(), "check"]).unwrap();

        let err = ConfigCliRunner::execute(&cli).unwrap_err();
        assert!(err.to_string().contains("jicofo.xmpp.client.domain@current"));
    }

    #[test]
    fn test_show_redacts_password() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, VALID);
        let cli = ConfigCli::try_parse_from(["focus", "--no-env", "-c", path.to_str().unwrap(), "show"]).unwrap();

        let output = ConfigCliRunner::execute(&cli).unwrap();
        assert!(output.contains("password (optional) = ********"));
        assert!(output.contains("conference-muc-jid = DomainJid(\"conference.example.com\")"));
        assert!(!output.contains("hunter2"));

        let cli = ConfigCli::try_parse_from(["focus", "--no-env", "-c", path.to_str().unwrap(), "show", "--json"]).unwrap();
        let output = ConfigCliRunner::execute(&cli).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["client"].as_array().unwrap().len(), 11);
        assert!(!output.contains("hunter2"));
    }

    fn lookup(args: &[&str]) -> String {
        let cli = ConfigCli::try_parse_from(["focus", "--no-env"].into_iter().chain(args.iter().copied())).unwrap();
        ConfigCliRunner::execute(&cli).unwrap()
    }

    #[test]
    fn test_lookup_command() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "jicofo:\n  xmpp:\n    client:\n      port: 5347\n");

        let output = lookup(&["-c", path.to_str().unwrap(), "lookup", "jicofo.xmpp.client.port"]);
        assert!(output.contains("(client.port)"));
        assert!(output.contains("jicofo.xmpp.client.port@current/file: 5347 (wins)"));
        assert!(output.contains("jicofo.xmpp.client.port@reference: 5222\n"));
    }

    #[test]
    fn test_lookup_follows_legacy_fallback() {
        let dir = TempDir::new().unwrap();
        let legacy = dir.path().join("sip-communicator.properties");
        std::fs::write(&legacy, "org.jitsi.jicofo.HOSTNAME=legacy.example.com\n").unwrap();

        let output = lookup(&["--legacy", legacy.to_str().unwrap(), "lookup", "jicofo.xmpp.client.hostname"]);
        assert!(output.contains("jicofo.xmpp.client.hostname@current: not set"));
        assert!(output.contains("org.jitsi.jicofo.HOSTNAME@legacy: legacy.example.com (wins)"));
        assert!(output.contains("jicofo.xmpp.client.hostname@reference: localhost\n"));
    }

    #[test]
    fn test_lookup_redacts_password() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, VALID);
        let legacy = dir.path().join("sip-communicator.properties");
        std::fs::write(&legacy, "org.jitsi.jicofo.FOCUS_USER_PASSWORD=hunter2\n").unwrap();

        for key in ["jicofo.xmpp.client.password", "org.jitsi.jicofo.FOCUS_USER_PASSWORD"] {
            let output = lookup(&[
                "-c",
                path.to_str().unwrap(),
                "--legacy",
                legacy.to_str().unwrap(),
                "lookup",
                key,
            ]);
            assert!(output.contains("(client.password)"));
            assert!(output.contains("jicofo.xmpp.client.password@current/file: ******** (wins)"));
            assert!(output.contains("org.jitsi.jicofo.FOCUS_USER_PASSWORD@legacy: ********"));
            assert!(!output.contains("hunter2"));
        }
    }

    #[test]
    fn test_lookup_unread_key_claims_no_winner() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "custom:\n  key: 7\n");

        let output = lookup(&["-c", path.to_str().unwrap(), "lookup", "custom.key"]);
        assert!(output.contains("not read by any property"));
        assert!(output.contains("current [current]: 7"));
        assert!(!output.contains("(wins)"));

        let output = lookup(&["lookup", "custom.missing"]);
        assert!(output.contains("is not set in any tier"));
    }

    #[test]
    fn test_show_json_is_valid_for_every_group() {
        let sources = SourceSet::reference_only().unwrap();
        let config = XmppConfig::new(&sources).unwrap();
        let output = render_json(&config).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["service"].as_array().unwrap().len(), 8);
        assert_eq!(json["client"][3]["name"], "domain");
        assert_eq!(json["client"][3]["state"], "failed");
    }
}
