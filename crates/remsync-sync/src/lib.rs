//! Remsync Sync - one-way synchronization engine
//!
//! Provides:
//! - Initial reconciliation of a source tree onto a target tree
//! - Live change observation (native watches locally, poll-diff remotely)
//! - A bounded worker pool with per-path serialization
//! - Retry of transient storage failures
//!
//! ## Modules
//!
//! - [`session`] - Session lifecycle wiring everything together
//! - [`strategy`] - Push (local to remote) and pull (remote to local) variants
//! - [`reconciler`] - Existence-based full-tree comparison
//! - [`push`] / [`poll`] - Change observers for the two directions
//! - [`pool`] - Task queue and workers
//! - [`handler`] - Applies a single task to the target tree
//! - [`filesystem`] / [`dir_remote`] - Storage adapters backed by the local filesystem

pub mod dir_remote;
pub mod filesystem;
pub mod filter;
pub mod handler;
pub mod locks;
pub mod poll;
pub mod pool;
pub mod push;
pub mod reconciler;
pub mod retry;
pub mod session;
pub mod strategy;
pub mod tree;
pub mod watcher;

use remsync_core::domain::DomainError;
use remsync_core::ports::StorageError;
use thiserror::Error;

pub use session::{SessionState, SyncSession};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// A storage port operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A domain-level error propagated from remsync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The worker pool no longer accepts tasks
    #[error("Worker pool is closed")]
    PoolClosed,

    /// A lifecycle operation was called in the wrong state
    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidState { from: SessionState, to: SessionState },

    /// The native change watcher could not be set up
    #[error("Watch error: {0}")]
    Watch(String),

    /// A structural failure aborted the reconciliation walk
    #[error("Reconciliation aborted at {path}: {source}")]
    Reconcile {
        path: String,
        #[source]
        source: StorageError,
    },
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Storage(e) if e.is_not_found())
    }
}
