//! Shared helpers for sync engine integration tests
//!
//! Both sides of a session live in temporary directories; the remote side is
//! served through `DirRemote`, optionally wrapped by [`FaultyRemote`] to
//! inject transport failures.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use remsync_core::domain::{
    Credentials, DirEntry, EntryMetadata, RemoteEndpoint, RemotePath, SessionConfig,
    SyncDirection,
};
use remsync_core::ports::{IRemoteStorage, ReadStream, StorageError, WriteStream};
use remsync_sync::dir_remote::DirRemote;
use remsync_sync::filesystem::LocalFileSystemAdapter;
use remsync_sync::SyncSession;
use tempfile::TempDir;

pub struct Sides {
    pub local: TempDir,
    pub remote: TempDir,
}

impl Sides {
    pub fn new() -> Self {
        Self {
            local: TempDir::new().unwrap(),
            remote: TempDir::new().unwrap(),
        }
    }

    /// Canonical local root, matching what the watcher reports
    pub fn local_root(&self) -> PathBuf {
        self.local.path().canonicalize().unwrap()
    }

    pub fn remote_root(&self) -> PathBuf {
        self.remote.path().to_path_buf()
    }
}

pub fn config(direction: SyncDirection, local: &Path) -> SessionConfig {
    SessionConfig::new(
        RemoteEndpoint::new("localhost", 22, "tester"),
        Credentials::Password("secret".into()),
        direction,
        local,
        RemotePath::new("/").unwrap(),
    )
    .with_workers(4)
    .with_retry_delay(Duration::from_millis(5))
    .with_poll_interval(Duration::from_millis(50))
}

pub fn session(config: SessionConfig, remote: Arc<dyn IRemoteStorage>) -> SyncSession {
    SyncSession::new(config, Arc::new(LocalFileSystemAdapter::new()), remote).unwrap()
}

pub fn dir_remote(sides: &Sides) -> Arc<DirRemote> {
    Arc::new(DirRemote::new(sides.remote_root()))
}

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

pub fn read(root: &Path, rel: &str) -> Option<String> {
    std::fs::read_to_string(root.join(rel)).ok()
}

/// Polls `check` until it holds or `timeout` elapses
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

/// Fails every `create` whose path ends with `poisoned` with a transport
/// error and counts the attempts
pub struct FaultyRemote {
    inner: DirRemote,
    poisoned: String,
    pub create_attempts: AtomicU32,
}

impl FaultyRemote {
    pub fn new(base: impl Into<PathBuf>, poisoned: &str) -> Self {
        Self {
            inner: DirRemote::new(base),
            poisoned: poisoned.to_string(),
            create_attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.create_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for FaultyRemote {
    async fn open(&self, path: &RemotePath) -> Result<ReadStream, StorageError> {
        self.inner.open(path).await
    }

    async fn create(&self, path: &RemotePath) -> Result<WriteStream, StorageError> {
        if path.as_str().ends_with(&self.poisoned) {
            self.create_attempts.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Transport("connection reset".into()));
        }
        self.inner.create(path).await
    }

    async fn stat(&self, path: &RemotePath) -> Result<EntryMetadata, StorageError> {
        self.inner.stat(path).await
    }

    async fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>, StorageError> {
        self.inner.list_dir(path).await
    }

    async fn make_dir(&self, path: &RemotePath) -> Result<(), StorageError> {
        self.inner.make_dir(path).await
    }

    async fn remove(&self, path: &RemotePath) -> Result<(), StorageError> {
        self.inner.remove(path).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.inner.close().await
    }
}
