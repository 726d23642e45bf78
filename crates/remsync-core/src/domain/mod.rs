//! Domain model
//!
//! Plain data types shared by the engine and its adapters. Nothing in this
//! module performs I/O.

pub mod direction;
pub mod entry;
pub mod errors;
pub mod paths;
pub mod session_config;
pub mod task;

pub use direction::SyncDirection;
pub use entry::{DirEntry, EntryMetadata};
pub use errors::DomainError;
pub use paths::{RelativePath, RemotePath};
pub use session_config::{Credentials, RemoteEndpoint, SessionConfig};
pub use task::{Task, TaskKind};
