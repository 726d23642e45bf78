//! Remsync SFTP - remote storage over SSH
//!
//! Connects to an SSH server, authenticates with a password or a key pair,
//! opens the `sftp` subsystem and exposes it as an
//! [`IRemoteStorage`](remsync_core::ports::IRemoteStorage).
//!
//! ## Usage
//!
//! ```rust,no_run
//! # async fn example(config: remsync_core::domain::SessionConfig) -> anyhow::Result<()> {
//! let session = remsync_sftp::connect(config).await?;
//! session.start().await?;
//! // ...
//! session.stop().await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;

use remsync_core::domain::{Credentials, SessionConfig};
use remsync_sync::filesystem::LocalFileSystemAdapter;
use remsync_sync::{SyncError, SyncSession};
use russh::client::{AuthResult, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh_sftp::client::SftpSession;
use thiserror::Error;
use tracing::info;

use crate::client::Client;
pub use crate::remote::SftpRemote;

/// Interval between SSH keepalive messages on an idle connection
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Failures while establishing the connection; the session is never created
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Failed to connect to {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: russh::Error,
    },

    #[error("Connection to {target} timed out after {timeout:?}")]
    DialTimeout { target: String, timeout: Duration },

    #[error("Host key of {0} is not in the allow-list")]
    HostKeyRejected(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to load private key {path}: {source}")]
    Key {
        path: String,
        #[source]
        source: russh::keys::Error,
    },

    #[error("Failed to start SFTP subsystem: {0}")]
    Subsystem(String),

    #[error(transparent)]
    Session(#[from] SyncError),
}

/// Dials, authenticates and opens the SFTP subsystem
///
/// The whole handshake is bounded by `config.dial_timeout`.
pub async fn connect_remote(config: &SessionConfig) -> Result<SftpRemote, ConnectError> {
    let target = config.endpoint.display_name();
    let ssh_config = Arc::new(russh::client::Config {
        keepalive_interval: Some(KEEPALIVE_INTERVAL),
        ..Default::default()
    });
    let handler = Client::new(config.host_key_fingerprints.clone());
    let addr = (config.endpoint.host.as_str(), config.endpoint.port);

    let mut handle = tokio::time::timeout(
        config.dial_timeout,
        russh::client::connect(ssh_config, addr, handler),
    )
    .await
    .map_err(|_| ConnectError::DialTimeout {
        target: target.clone(),
        timeout: config.dial_timeout,
    })?
    .map_err(|e| match e {
        russh::Error::UnknownKey => ConnectError::HostKeyRejected(target.clone()),
        source => ConnectError::Dial {
            target: target.clone(),
            source,
        },
    })?;

    authenticate(&mut handle, config).await?;
    info!(remote = %target, "Authenticated");

    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| ConnectError::Subsystem(e.to_string()))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| ConnectError::Subsystem(e.to_string()))?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| ConnectError::Subsystem(e.to_string()))?;

    info!(remote = %target, "SFTP session established");
    Ok(SftpRemote::new(sftp, handle, target))
}

async fn authenticate(
    handle: &mut Handle<Client>,
    config: &SessionConfig,
) -> Result<(), ConnectError> {
    let user = config.endpoint.username.as_str();
    let result = match &config.credentials {
        Credentials::Password(password) => handle
            .authenticate_password(user, password.as_str())
            .await
            .map_err(|e| ConnectError::Authentication(e.to_string()))?,
        Credentials::KeyPair {
            private_key,
            passphrase,
        } => {
            let key = russh::keys::load_secret_key(private_key, passphrase.as_deref()).map_err(
                |source| ConnectError::Key {
                    path: private_key.display().to_string(),
                    source,
                },
            )?;
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .map_err(|e| ConnectError::Authentication(e.to_string()))?
                .flatten();
            handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                .await
                .map_err(|e| ConnectError::Authentication(e.to_string()))?
        }
    };

    match result {
        AuthResult::Success => Ok(()),
        AuthResult::Failure {
            remaining_methods,
            partial_success,
        } => Err(ConnectError::Authentication(format!(
            "rejected for user {user} (remaining methods: {remaining_methods:?}, partial success: {partial_success})"
        ))),
    }
}

/// Connects to the configured server and builds a session over it
///
/// Connection failures are returned before any session state exists. The
/// session owns the connection and closes it on `stop()`.
pub async fn connect(config: SessionConfig) -> Result<SyncSession, ConnectError> {
    let remote = connect_remote(&config).await?;
    let session = SyncSession::new(
        config,
        Arc::new(LocalFileSystemAdapter::new()),
        Arc::new(remote),
    )?;
    Ok(session)
}
