//! Directory-backed remote storage
//!
//! [`DirRemote`] serves a remote namespace out of a local directory, for
//! remotes reachable as a mount point (NFS, sshfs, a synced share) and for
//! exercising the engine without a network. Absolute and relative remote
//! paths both resolve below the base directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use remsync_core::domain::{DirEntry, EntryMetadata, RemotePath};
use remsync_core::ports::{
    ILocalFileSystem, IRemoteStorage, ReadStream, StorageError, WriteStream,
};
use tracing::debug;

use crate::filesystem::LocalFileSystemAdapter;

#[derive(Debug)]
pub struct DirRemote {
    base: PathBuf,
    fs: LocalFileSystemAdapter,
    closed: AtomicBool,
}

impl DirRemote {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            fs: LocalFileSystemAdapter::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn resolve(&self, path: &RemotePath) -> Result<PathBuf, StorageError> {
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        let mut out = self.base.clone();
        for segment in path.as_str().split('/') {
            if !segment.is_empty() && segment != "." {
                out.push(segment);
            }
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for DirRemote {
    async fn open(&self, path: &RemotePath) -> Result<ReadStream, StorageError> {
        self.fs.open(&self.resolve(path)?).await
    }

    async fn create(&self, path: &RemotePath) -> Result<WriteStream, StorageError> {
        self.fs.create(&self.resolve(path)?).await
    }

    async fn stat(&self, path: &RemotePath) -> Result<EntryMetadata, StorageError> {
        self.fs.stat(&self.resolve(path)?).await
    }

    async fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>, StorageError> {
        self.fs.list_dir(&self.resolve(path)?).await
    }

    async fn make_dir(&self, path: &RemotePath) -> Result<(), StorageError> {
        self.fs.make_dir(&self.resolve(path)?).await
    }

    async fn remove(&self, path: &RemotePath) -> Result<(), StorageError> {
        self.fs.remove(&self.resolve(path)?).await
    }

    async fn close(&self) -> Result<(), StorageError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(base = %self.base.display(), "Directory remote closed");
        }
        Ok(())
    }
}
