//! Storage ports bound to a sync root
//!
//! A [`SyncTree`] exposes the port operations on [`RelativePath`]s, so the
//! reconciler, the observers and the task handler are written once and work
//! in both directions. Translating a path between the two sides is
//! `to.locate(from.relativize(p)?)`.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use remsync_core::domain::{DirEntry, DomainError, EntryMetadata, RelativePath, RemotePath};
use remsync_core::ports::{ILocalFileSystem, IRemoteStorage, ReadStream, StorageError, WriteStream};

/// A concrete location on one side of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreePath {
    Local(PathBuf),
    Remote(RemotePath),
}

impl Display for TreePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TreePath::Local(p) => write!(f, "{}", p.display()),
            TreePath::Remote(p) => write!(f, "remote:{p}"),
        }
    }
}

#[async_trait::async_trait]
pub trait SyncTree: Send + Sync {
    /// Absolute location of `rel` on this side
    fn locate(&self, rel: &RelativePath) -> TreePath;

    /// Inverse of [`SyncTree::locate`]
    fn relativize(&self, path: &TreePath) -> Result<RelativePath, DomainError>;

    async fn open(&self, rel: &RelativePath) -> Result<ReadStream, StorageError>;
    async fn create(&self, rel: &RelativePath) -> Result<WriteStream, StorageError>;
    async fn stat(&self, rel: &RelativePath) -> Result<EntryMetadata, StorageError>;
    async fn list_dir(&self, rel: &RelativePath) -> Result<Vec<DirEntry>, StorageError>;
    async fn make_dir(&self, rel: &RelativePath) -> Result<(), StorageError>;
    async fn remove(&self, rel: &RelativePath) -> Result<(), StorageError>;

    /// Creates the missing directories above the root, outermost first
    async fn make_root_parents(&self) -> Result<(), StorageError>;
}

/// Maps a location on one side to its counterpart on the other
pub fn translate(
    from: &dyn SyncTree,
    to: &dyn SyncTree,
    path: &TreePath,
) -> Result<TreePath, DomainError> {
    Ok(to.locate(&from.relativize(path)?))
}

// ============================================================================
// LocalTree
// ============================================================================

pub struct LocalTree {
    root: PathBuf,
    fs: Arc<dyn ILocalFileSystem>,
}

impl LocalTree {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn ILocalFileSystem>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn path(&self, rel: &RelativePath) -> PathBuf {
        rel.to_local(&self.root)
    }
}

#[async_trait::async_trait]
impl SyncTree for LocalTree {
    fn locate(&self, rel: &RelativePath) -> TreePath {
        TreePath::Local(self.path(rel))
    }

    fn relativize(&self, path: &TreePath) -> Result<RelativePath, DomainError> {
        match path {
            TreePath::Local(p) => RelativePath::from_local(&self.root, p),
            TreePath::Remote(p) => Err(DomainError::PathNotInRoot(format!(
                "remote path {p} given to local tree"
            ))),
        }
    }

    async fn open(&self, rel: &RelativePath) -> Result<ReadStream, StorageError> {
        self.fs.open(&self.path(rel)).await
    }

    async fn create(&self, rel: &RelativePath) -> Result<WriteStream, StorageError> {
        self.fs.create(&self.path(rel)).await
    }

    async fn stat(&self, rel: &RelativePath) -> Result<EntryMetadata, StorageError> {
        self.fs.stat(&self.path(rel)).await
    }

    async fn list_dir(&self, rel: &RelativePath) -> Result<Vec<DirEntry>, StorageError> {
        self.fs.list_dir(&self.path(rel)).await
    }

    async fn make_dir(&self, rel: &RelativePath) -> Result<(), StorageError> {
        self.fs.make_dir(&self.path(rel)).await
    }

    async fn remove(&self, rel: &RelativePath) -> Result<(), StorageError> {
        self.fs.remove(&self.path(rel)).await
    }

    async fn make_root_parents(&self) -> Result<(), StorageError> {
        let mut missing = Vec::new();
        let mut next = self.root.parent();
        while let Some(dir) = next.filter(|d| !d.as_os_str().is_empty()) {
            match self.fs.stat(dir).await {
                Ok(_) => break,
                Err(e) if e.is_not_found() => missing.push(dir.to_path_buf()),
                Err(e) => return Err(e),
            }
            next = dir.parent();
        }
        for dir in missing.iter().rev() {
            self.fs.make_dir(dir).await?;
        }
        Ok(())
    }
}

// ============================================================================
// RemoteTree
// ============================================================================

pub struct RemoteTree {
    root: RemotePath,
    remote: Arc<dyn IRemoteStorage>,
}

impl RemoteTree {
    pub fn new(root: RemotePath, remote: Arc<dyn IRemoteStorage>) -> Self {
        Self { root, remote }
    }

    pub fn root(&self) -> &RemotePath {
        &self.root
    }

    fn path(&self, rel: &RelativePath) -> RemotePath {
        self.root.join_relative(rel)
    }
}

#[async_trait::async_trait]
impl SyncTree for RemoteTree {
    fn locate(&self, rel: &RelativePath) -> TreePath {
        TreePath::Remote(self.path(rel))
    }

    fn relativize(&self, path: &TreePath) -> Result<RelativePath, DomainError> {
        match path {
            TreePath::Remote(p) => p.relative_to(&self.root),
            TreePath::Local(p) => Err(DomainError::PathNotInRoot(format!(
                "local path {} given to remote tree",
                p.display()
            ))),
        }
    }

    async fn open(&self, rel: &RelativePath) -> Result<ReadStream, StorageError> {
        self.remote.open(&self.path(rel)).await
    }

    async fn create(&self, rel: &RelativePath) -> Result<WriteStream, StorageError> {
        self.remote.create(&self.path(rel)).await
    }

    async fn stat(&self, rel: &RelativePath) -> Result<EntryMetadata, StorageError> {
        self.remote.stat(&self.path(rel)).await
    }

    async fn list_dir(&self, rel: &RelativePath) -> Result<Vec<DirEntry>, StorageError> {
        self.remote.list_dir(&self.path(rel)).await
    }

    async fn make_dir(&self, rel: &RelativePath) -> Result<(), StorageError> {
        self.remote.make_dir(&self.path(rel)).await
    }

    async fn remove(&self, rel: &RelativePath) -> Result<(), StorageError> {
        self.remote.remove(&self.path(rel)).await
    }

    async fn make_root_parents(&self) -> Result<(), StorageError> {
        let mut missing = Vec::new();
        let mut next = self.root.parent();
        while let Some(dir) = next {
            match self.remote.stat(&dir).await {
                Ok(_) => break,
                Err(e) if e.is_not_found() => {
                    next = dir.parent();
                    missing.push(dir);
                }
                Err(e) => return Err(e),
            }
        }
        for dir in missing.iter().rev() {
            self.remote.make_dir(dir).await?;
        }
        Ok(())
    }
}
