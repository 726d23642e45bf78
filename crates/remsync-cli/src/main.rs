//! remsync CLI - one-way directory synchronization over SFTP
//!
//! Provides commands for:
//! - Running a sync session (continuous, or one reconciliation pass)
//! - Viewing and validating the configuration
//! - Storing the remote password in the system keyring

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use remsync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{auth::AuthCommand, config::ConfigCommand, sync::SyncCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "remsync", version, about = "Mirror a directory tree to or from an SFTP server")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize the local and remote roots
    Sync(SyncCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage stored credentials
    #[command(subcommand)]
    Auth(AuthCommand),
}

/// Shared options passed to every command
#[derive(Debug, Clone)]
pub struct Context {
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// Chooses the default log level: `-v` flags win over `logging.level`
fn log_level(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_tracing(verbose: u8, config: &Config) {
    let level = log_level(verbose, &config.logging.level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    init_tracing(cli.verbose, &Config::load_or_default(&config_path));

    let ctx = Context {
        config_path,
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Auth(cmd) => cmd.execute(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbose_overrides_configured_level() {
        assert_eq!(log_level(0, "warn"), "warn");
        assert_eq!(log_level(1, "warn"), "debug");
        assert_eq!(log_level(3, "warn"), "trace");
    }

    #[test]
    fn test_parse_sync_once() {
        let cli = Cli::try_parse_from(["remsync", "sync", "--once", "--direction", "remote-to-local"])
            .unwrap();
        match cli.command {
            Commands::Sync(cmd) => {
                assert!(cmd.once);
                assert!(cmd.direction.is_some());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
