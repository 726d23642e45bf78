//! SFTP implementation of [`IRemoteStorage`]
//!
//! A single SFTP session is shared by every worker; the protocol multiplexes
//! requests by id so concurrent calls only contend on the read side of the
//! lock. `close()` takes the write side, waits for running calls to finish
//! and tears down the session and the SSH connection.

use chrono::{DateTime, Utc};
use remsync_core::domain::{DirEntry, EntryMetadata, RemotePath};
use remsync_core::ports::{IRemoteStorage, ReadStream, StorageError, WriteStream};
use russh::client::Handle;
use russh::Disconnect;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, info, instrument};

use crate::client::Client;

pub struct SftpRemote {
    sftp: RwLock<Option<SftpSession>>,
    handle: Mutex<Option<Handle<Client>>>,
    display_name: String,
}

impl SftpRemote {
    pub(crate) fn new(sftp: SftpSession, handle: Handle<Client>, display_name: String) -> Self {
        Self {
            sftp: RwLock::new(Some(sftp)),
            handle: Mutex::new(Some(handle)),
            display_name,
        }
    }

    /// `user@host:port` of the server this remote is connected to
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    async fn session(&self) -> Result<RwLockReadGuard<'_, SftpSession>, StorageError> {
        RwLockReadGuard::try_map(self.sftp.read().await, |s| s.as_ref())
            .map_err(|_| StorageError::Closed)
    }
}

impl std::fmt::Debug for SftpRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpRemote")
            .field("remote", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Maps an SFTP failure on `path` to the port error
///
/// `NoSuchFile` is the only logical absence; lost connections and raw I/O
/// failures are transport errors and therefore retried.
pub(crate) fn map_sftp_error(err: SftpError, path: &RemotePath) -> StorageError {
    let path = path.as_str().to_string();
    match err {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => StorageError::NotFound(path),
            StatusCode::PermissionDenied => StorageError::PermissionDenied(path),
            StatusCode::NoConnection | StatusCode::ConnectionLost => {
                StorageError::Transport(format!("{path}: {}", status.error_message))
            }
            _ => StorageError::Other(format!("{path}: {}", status.error_message)),
        },
        SftpError::Timeout => StorageError::Timeout(path),
        SftpError::IO(msg) => StorageError::Transport(format!("{path}: {msg}")),
        other => StorageError::Other(format!("{path}: {other}")),
    }
}

pub(crate) fn to_entry_metadata(attrs: &FileAttributes) -> EntryMetadata {
    let modified = attrs
        .mtime
        .and_then(|secs| DateTime::<Utc>::from_timestamp(i64::from(secs), 0));
    if attrs.is_dir() {
        EntryMetadata::directory(modified)
    } else {
        EntryMetadata::file(attrs.size.unwrap_or(0), modified)
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for SftpRemote {
    #[instrument(skip(self), fields(path = %path))]
    async fn open(&self, path: &RemotePath) -> Result<ReadStream, StorageError> {
        let sftp = self.session().await?;
        let file = sftp
            .open(path.as_str())
            .await
            .map_err(|e| map_sftp_error(e, path))?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn create(&self, path: &RemotePath) -> Result<WriteStream, StorageError> {
        let sftp = self.session().await?;
        let file = sftp
            .create(path.as_str())
            .await
            .map_err(|e| map_sftp_error(e, path))?;
        Ok(Box::new(file))
    }

    async fn stat(&self, path: &RemotePath) -> Result<EntryMetadata, StorageError> {
        let sftp = self.session().await?;
        let attrs = sftp
            .metadata(path.as_str())
            .await
            .map_err(|e| map_sftp_error(e, path))?;
        Ok(to_entry_metadata(&attrs))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>, StorageError> {
        let sftp = self.session().await?;
        let dir = sftp
            .read_dir(path.as_str())
            .await
            .map_err(|e| map_sftp_error(e, path))?;

        let mut entries: Vec<DirEntry> = dir
            .filter_map(|entry| {
                let name = entry.file_name();
                if name == "." || name == ".." {
                    return None;
                }
                let metadata = to_entry_metadata(&entry.metadata());
                Some(DirEntry::new(name, metadata))
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn make_dir(&self, path: &RemotePath) -> Result<(), StorageError> {
        let sftp = self.session().await?;
        match sftp.metadata(path.as_str()).await {
            Ok(attrs) if attrs.is_dir() => return Ok(()),
            Ok(_) => return Err(StorageError::AlreadyExists(path.as_str().to_string())),
            Err(e) => match map_sftp_error(e, path) {
                StorageError::NotFound(_) => {}
                other => return Err(other),
            },
        }

        if let Err(e) = sftp.create_dir(path.as_str()).await {
            // Servers report an existing directory as a generic failure;
            // another worker may have created it in the meantime.
            match sftp.metadata(path.as_str()).await {
                Ok(attrs) if attrs.is_dir() => {}
                _ => return Err(map_sftp_error(e, path)),
            }
        }
        debug!(path = %path, "Remote directory created");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn remove(&self, path: &RemotePath) -> Result<(), StorageError> {
        let sftp = self.session().await?;
        let attrs = sftp
            .symlink_metadata(path.as_str())
            .await
            .map_err(|e| map_sftp_error(e, path))?;
        let result = if attrs.is_dir() {
            sftp.remove_dir(path.as_str()).await
        } else {
            sftp.remove_file(path.as_str()).await
        };
        result.map_err(|e| map_sftp_error(e, path))
    }

    async fn close(&self) -> Result<(), StorageError> {
        if let Some(sftp) = self.sftp.write().await.take() {
            if let Err(e) = sftp.close().await {
                debug!(error = %e, "SFTP session close failed");
            }
        }
        if let Some(handle) = self.handle.lock().await.take() {
            handle
                .disconnect(Disconnect::ByApplication, "session closed", "en")
                .await
                .map_err(|e| StorageError::Transport(e.to_string()))?;
            info!(remote = %self.display_name, "Disconnected");
        }
        Ok(())
    }
}
