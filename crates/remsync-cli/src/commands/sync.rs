//! Sync command - run a synchronization session
//!
//! Provides the `remsync sync` CLI command which:
//! 1. Loads and validates the configuration
//! 2. Resolves the password (config file or system keyring)
//! 3. Connects over SFTP and builds the session
//! 4. Reconciles, then either exits (`--once`) or keeps observing until
//!    SIGINT/SIGTERM

use anyhow::{bail, Context as _, Result};
use clap::{Args, ValueEnum};
use remsync_core::config::{AuthMethod, Config};
use remsync_core::domain::SyncDirection;
use remsync_sync::reconciler::ReconcileReport;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::auth::KeyringPasswordStore;
use crate::output::{get_formatter, plural, OutputFormat, OutputFormatter};
use crate::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    LocalToRemote,
    RemoteToLocal,
}

impl From<DirectionArg> for SyncDirection {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::LocalToRemote => SyncDirection::LocalToRemote,
            DirectionArg::RemoteToLocal => SyncDirection::RemoteToLocal,
        }
    }
}

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Reconcile once, wait for the transfers and exit
    #[arg(long)]
    pub once: bool,

    /// Override `sync.direction` from the configuration
    #[arg(long, value_enum)]
    pub direction: Option<DirectionArg>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = get_formatter(ctx.format, ctx.quiet);

        let mut config = Config::load(&ctx.config_path).with_context(|| {
            format!(
                "Failed to load {} (run 'remsync config init' first)",
                ctx.config_path.display()
            )
        })?;
        if let Some(direction) = self.direction {
            config.sync.direction = direction.into();
        }

        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                fmt.error(&error.to_string());
            }
            bail!("invalid configuration in {}", ctx.config_path.display());
        }

        let password = match config.remote.auth_method {
            AuthMethod::Password if config.remote.password.is_none() => {
                KeyringPasswordStore::load(&config.keyring_user())?
            }
            _ => None,
        };
        let session_config = config
            .to_session_config(password)
            .context("Failed to build session configuration")?;
        let direction = session_config.direction;

        fmt.note(&format!(
            "Connecting to {}...",
            session_config.endpoint.display_name()
        ));
        let session = remsync_sftp::connect(session_config)
            .await
            .context("Failed to connect")?;

        let cancel = session.cancellation_token();
        let signals = tokio::spawn(shutdown_signal(cancel.clone()));

        let result = if self.once {
            session.run_once().await
        } else {
            match session.start().await {
                Ok(report) => {
                    print_report(&*fmt, ctx.format, direction, &report);
                    fmt.success("Watching for changes (Ctrl+C to stop)");
                    cancel.cancelled().await;
                    session.stop().await.map(|()| report)
                }
                Err(e) => {
                    if let Err(stop_err) = session.stop().await {
                        warn!(error = %stop_err, "Failed to stop session");
                    }
                    Err(e)
                }
            }
        };
        signals.abort();

        let report = result.context("Synchronization failed")?;
        if self.once {
            print_report(&*fmt, ctx.format, direction, &report);
        } else {
            fmt.success("Stopped");
        }
        Ok(())
    }
}

fn print_report(
    fmt: &dyn OutputFormatter,
    format: OutputFormat,
    direction: SyncDirection,
    report: &ReconcileReport,
) {
    if format == OutputFormat::Json {
        fmt.document(&serde_json::json!({
            "direction": direction.as_str(),
            "directories_created": report.directories_created,
            "files_transferred": report.files_scheduled,
            "files_present": report.files_present,
            "ignored": report.ignored,
            "cancelled": report.cancelled,
        }));
        return;
    }

    if report.cancelled {
        fmt.warn("Reconciliation was interrupted");
    } else if report.files_scheduled == 0 && report.directories_created == 0 {
        fmt.success("Already up to date");
    } else {
        fmt.success("Reconciliation complete");
    }
    fmt.field("Direction", direction.as_str());
    fmt.field(
        &format!("Scheduled for {}", direction.transfer_verb()),
        &plural(report.files_scheduled, "file", "files"),
    );
    if report.directories_created > 0 {
        fmt.field(
            "Directories created",
            &plural(report.directories_created, "directory", "directories"),
        );
    }
    fmt.field(
        "Already present",
        &plural(report.files_present, "file", "files"),
    );
    if report.ignored > 0 {
        fmt.field("Ignored", &plural(report.ignored, "entry", "entries"));
    }
}

/// Waits for SIGTERM or SIGINT and cancels the session token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}
