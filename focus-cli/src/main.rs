use anyhow::{Context, Result};
use clap::Parser;
use focus_config::cli::{ConfigCli, ConfigCliRunner, ConfigCommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Console tracing; also picks up records from the `log` facade
///
/// An explicit `--log-level` wins over `RUST_LOG`; with neither, only
/// warnings are shown.
fn init_tracing(log_level: Option<&str>) -> Result<()> {
    let env_filter = build_filter(log_level);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

fn build_filter(log_level: Option<&str>) -> EnvFilter {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level).or_else(|_| EnvFilter::try_from_default_env()),
        None => EnvFilter::try_from_default_env(),
    };
    filter.unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn run(cli: &ConfigCli) -> Result<String> {
    let action = match &cli.command {
        ConfigCommand::Show { .. } => "resolve configuration".to_string(),
        ConfigCommand::Check => "check configuration".to_string(),
        ConfigCommand::Lookup { key } => format!("look up '{}'", key),
    };
    ConfigCliRunner::execute(cli).with_context(|| format!("Failed to {}", action))
}

fn main() {
    let cli = ConfigCli::parse();

    if let Err(e) = init_tracing(cli.log_level.as_deref()) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }
    debug!(?cli, "Starting focus");

    match run(&cli) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}
