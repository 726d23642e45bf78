//! Remote storage port (driven/secondary port)
//!
//! Capability interface over a remote namespace. The engine only ever talks
//! to the remote side through this trait; protocol adapters implement it.
//!
//! ## Design Notes
//!
//! - `create` never creates intermediate directories, callers `make_dir`
//!   first.
//! - `make_dir` is idempotent.
//! - `remove` removes a file or an empty directory and fails with
//!   `StorageError::NotFound` when the path is absent.
//! - Streams returned by `create` must be shut down to commit the write.

use tokio::io::{AsyncRead, AsyncWrite};

use super::storage_error::StorageError;
use crate::domain::{DirEntry, EntryMetadata, RemotePath};

/// Readable stream over a remote or local file
pub type ReadStream = Box<dyn AsyncRead + Send + Unpin>;

/// Writable stream over a remote or local file
pub type WriteStream = Box<dyn AsyncWrite + Send + Unpin>;

#[async_trait::async_trait]
pub trait IRemoteStorage: Send + Sync {
    /// Opens a file for reading
    async fn open(&self, path: &RemotePath) -> Result<ReadStream, StorageError>;

    /// Creates or truncates a file for writing
    async fn create(&self, path: &RemotePath) -> Result<WriteStream, StorageError>;

    async fn stat(&self, path: &RemotePath) -> Result<EntryMetadata, StorageError>;

    /// Lists a directory, sorted by name
    async fn list_dir(&self, path: &RemotePath) -> Result<Vec<DirEntry>, StorageError>;

    /// Creates a directory, succeeding if it already exists
    async fn make_dir(&self, path: &RemotePath) -> Result<(), StorageError>;

    /// Removes a file or an empty directory
    async fn remove(&self, path: &RemotePath) -> Result<(), StorageError>;

    /// Closes the underlying connection; later calls fail with `Closed`
    async fn close(&self) -> Result<(), StorageError>;
}
