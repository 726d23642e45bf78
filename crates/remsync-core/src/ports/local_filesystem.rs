//! Local filesystem port (driven/secondary port)
//!
//! Mirrors [`super::IRemoteStorage`] over absolute local paths so that the
//! engine can treat both sides symmetrically. Change notification lives in
//! the separate [`super::IChangeWatcher`] port.

use std::path::Path;

use super::remote_storage::{ReadStream, WriteStream};
use super::storage_error::StorageError;
use crate::domain::{DirEntry, EntryMetadata};

#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    async fn open(&self, path: &Path) -> Result<ReadStream, StorageError>;

    /// Creates or truncates a file; parent directories are NOT created
    async fn create(&self, path: &Path) -> Result<WriteStream, StorageError>;

    async fn stat(&self, path: &Path) -> Result<EntryMetadata, StorageError>;

    /// Lists a directory, sorted by name
    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError>;

    /// Creates a directory, succeeding if it already exists
    async fn make_dir(&self, path: &Path) -> Result<(), StorageError>;

    /// Removes a file or an empty directory
    async fn remove(&self, path: &Path) -> Result<(), StorageError>;
}
