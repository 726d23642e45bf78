//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the traits the sync engine depends on; adapter crates provide
//! the implementations.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStorage`] - Remote namespace operations (SFTP, mounted directory)
//! - [`ILocalFileSystem`] - Local filesystem operations
//! - [`IChangeWatcher`] - Native change notification for local directories

pub mod change_watcher;
pub mod local_filesystem;
pub mod remote_storage;
pub mod storage_error;

pub use change_watcher::{ChangeEvent, IChangeWatcher};
pub use local_filesystem::ILocalFileSystem;
pub use remote_storage::{IRemoteStorage, ReadStream, WriteStream};
pub use storage_error::StorageError;
