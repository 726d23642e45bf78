//! Auth commands - store the remote password in the system keyring
//!
//! Provides the `remsync auth` subcommands:
//! 1. `set-password` - stores the password for the configured `user@host`
//! 2. `clear` - removes it again
//! 3. `status` - reports whether a password is stored

use std::io::{BufRead, Write};

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use remsync_core::config::Config;
use tracing::{debug, info};

use crate::output::{get_formatter, OutputFormat};
use crate::Context;

/// Keyring service name under which passwords are stored
const KEYRING_SERVICE: &str = "remsync";

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Store the remote password in the system keyring
    SetPassword {
        /// Password to store; read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Remove the stored password
    Clear,
    /// Show whether a password is stored
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let fmt = get_formatter(ctx.format, ctx.quiet);
        let config = Config::load_or_default(&ctx.config_path);
        if config.remote.host.trim().is_empty() || config.remote.username.trim().is_empty() {
            bail!(
                "remote.host and remote.username must be configured in {}",
                ctx.config_path.display()
            );
        }
        let user = config.keyring_user();

        match self {
            AuthCommand::SetPassword { password } => {
                let password = match password {
                    Some(p) => p.clone(),
                    None => prompt_password(&user)?,
                };
                if password.is_empty() {
                    bail!("Refusing to store an empty password");
                }
                KeyringPasswordStore::store(&user, &password)?;
                fmt.success(&format!("Password stored for {user}"));
            }
            AuthCommand::Clear => {
                KeyringPasswordStore::clear(&user)?;
                fmt.success(&format!("Password cleared for {user}"));
            }
            AuthCommand::Status => {
                let stored = KeyringPasswordStore::load(&user)?.is_some();
                if ctx.format == OutputFormat::Json {
                    fmt.document(&serde_json::json!({ "user": user, "stored": stored }));
                } else if stored {
                    fmt.success(&format!("Password stored for {user}"));
                } else {
                    fmt.note(&format!("No password stored for {user}"));
                }
            }
        }
        Ok(())
    }
}

fn prompt_password(user: &str) -> Result<String> {
    eprint!("Password for {user}: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Stores and retrieves remote passwords in the OS credential store
///
/// Entries use the service name `remsync` and the account `user@host`.
pub struct KeyringPasswordStore;

impl KeyringPasswordStore {
    pub fn store(user: &str, password: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, user)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keyring")?;
        info!(user, "Stored password in keyring");
        Ok(())
    }

    /// `None` when no password is stored for `user`
    pub fn load(user: &str) -> Result<Option<String>> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, user)
            .context("Failed to create keyring entry")?;
        match entry.get_password() {
            Ok(password) => {
                debug!(user, "Loaded password from keyring");
                Ok(Some(password))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    pub fn clear(user: &str) -> Result<()> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, user)
            .context("Failed to create keyring entry")?;
        match entry.delete_credential() {
            Ok(()) => {
                info!(user, "Cleared password from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(user, "No password to clear");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}
