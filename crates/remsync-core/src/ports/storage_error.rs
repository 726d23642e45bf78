//! Errors shared by the storage ports
//!
//! Callers distinguish a logical [`StorageError::NotFound`] (drives the
//! reconcile decision) from transport failures (eligible for retry).

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Connection reset, broken pipe and other link failures
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The storage handle was closed
    #[error("Storage closed")]
    Closed,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl StorageError {
    /// Classifies an `io::Error` raised while operating on `path`
    pub fn from_io(err: io::Error, path: impl std::fmt::Display) -> Self {
        let path = path.to_string();
        match err.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(path),
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path),
            io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(path),
            io::ErrorKind::TimedOut => StorageError::Timeout(path),
            _ => StorageError::Io { path, source: err },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Transport(_) | StorageError::Timeout(_) => true,
            StorageError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classification() {
        let e = StorageError::from_io(io::Error::from(io::ErrorKind::NotFound), "/a");
        assert!(e.is_not_found());
        assert!(!e.is_transient());

        let e = StorageError::from_io(io::Error::from(io::ErrorKind::BrokenPipe), "/a");
        assert!(e.is_transient());

        let e = StorageError::from_io(io::Error::from(io::ErrorKind::TimedOut), "/a");
        assert!(matches!(e, StorageError::Timeout(_)));
        assert!(e.is_transient());
    }

    #[test]
    fn test_logical_errors_not_transient() {
        assert!(!StorageError::PermissionDenied("x".into()).is_transient());
        assert!(!StorageError::Closed.is_transient());
        assert!(StorageError::Transport("reset".into()).is_transient());
    }
}
