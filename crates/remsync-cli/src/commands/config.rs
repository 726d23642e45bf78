//! Config command - view and manage the remsync configuration
//!
//! Provides the `remsync config` subcommands:
//! 1. `show` - prints the effective configuration (YAML or JSON)
//! 2. `path` - prints the configuration file location
//! 3. `validate` - loads the file and reports every problem found
//! 4. `init` - writes a starting configuration

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use remsync_core::config::{AuthMethod, Config, ConfigBuilder};
use remsync_core::domain::SyncDirection;
use tracing::info;

use crate::commands::sync::DirectionArg;
use crate::output::{get_formatter, OutputFormat};
use crate::Context;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Validate configuration file
    Validate,
    /// Create a configuration file
    Init {
        /// Remote host name or address
        #[arg(long)]
        host: String,
        /// Remote user name
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 22)]
        port: u16,
        /// Remote root directory
        #[arg(long)]
        remote_root: String,
        /// Local root directory
        #[arg(long)]
        local_root: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "local-to-remote")]
        direction: DirectionArg,
        /// Authenticate with a private key instead of a password
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Path => {
                let fmt = get_formatter(ctx.format, ctx.quiet);
                if ctx.format == OutputFormat::Json {
                    fmt.document(&serde_json::json!({
                        "config_path": ctx.config_path.display().to_string(),
                        "exists": ctx.config_path.exists(),
                    }));
                } else {
                    println!("{}", ctx.config_path.display());
                }
                Ok(())
            }
            ConfigCommand::Validate => execute_validate(ctx),
            ConfigCommand::Init {
                host,
                user,
                port,
                remote_root,
                local_root,
                direction,
                key_file,
                force,
            } => {
                let mut builder = ConfigBuilder::new()
                    .remote_host(host.as_str())
                    .remote_username(user.as_str())
                    .remote_port(*port)
                    .sync_remote_root(remote_root.as_str())
                    .sync_direction(SyncDirection::from(*direction));
                if let Some(root) = local_root {
                    builder = builder.sync_local_root(root.clone());
                }
                if let Some(key) = key_file {
                    builder = builder
                        .remote_auth_method(AuthMethod::Key)
                        .remote_key_file(key.clone());
                }
                execute_init(ctx, builder.build(), *force)
            }
        }
    }
}

fn execute_show(ctx: &Context) -> Result<()> {
    let fmt = get_formatter(ctx.format, ctx.quiet);
    let config = Config::load_or_default(&ctx.config_path);
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if ctx.format == OutputFormat::Json {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        fmt.document(&json);
    } else {
        fmt.success(&format!("Configuration ({})", ctx.config_path.display()));
        fmt.note("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            fmt.note(line);
        }
    }
    Ok(())
}

fn execute_validate(ctx: &Context) -> Result<()> {
    let fmt = get_formatter(ctx.format, ctx.quiet);
    let path = &ctx.config_path;

    let config = match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            let message = if path.exists() {
                format!("Failed to parse configuration: {e}")
            } else {
                "Configuration file not found. Run 'remsync config init' to create one.".to_string()
            };
            if ctx.format == OutputFormat::Json {
                fmt.document(&serde_json::json!({
                    "valid": false,
                    "config_path": path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                fmt.error(&message);
                fmt.note(&format!("File: {}", path.display()));
            }
            bail!("invalid configuration");
        }
    };

    let errors = config.validate();
    if ctx.format == OutputFormat::Json {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        fmt.document(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        fmt.success("Configuration is valid");
        fmt.note(&format!("File: {}", path.display()));
    } else {
        fmt.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        fmt.note(&format!("File: {}", path.display()));
        for error in &errors {
            fmt.note(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("invalid configuration")
    }
}

fn execute_init(ctx: &Context, config: Config, force: bool) -> Result<()> {
    let fmt = get_formatter(ctx.format, ctx.quiet);
    let path = &ctx.config_path;
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            fmt.error(&error.to_string());
        }
        bail!("refusing to write an invalid configuration");
    }

    config
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(config_path = %path.display(), "Configuration written");

    if ctx.format == OutputFormat::Json {
        fmt.document(&serde_json::json!({
            "success": true,
            "config_path": path.display().to_string(),
        }));
    } else {
        fmt.success(&format!("Configuration written to {}", path.display()));
        if config.remote.auth_method == AuthMethod::Password {
            fmt.note("Store the password with 'remsync auth set-password'");
        }
    }
    Ok(())
}
