//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **No implicit parents**: `create` fails with `NotFound` when the parent
//!   directory is missing, matching the remote port contract.
//! - **Idempotent mkdir**: an existing directory is success, an existing file
//!   at the same path is `AlreadyExists`.
//! - **Sorted listings**: `list_dir` returns entries ordered by name so walks
//!   are deterministic.

use std::path::Path;

use chrono::{DateTime, Utc};
use remsync_core::domain::{DirEntry, EntryMetadata};
use remsync_core::ports::{ILocalFileSystem, ReadStream, StorageError, WriteStream};
use tracing::{debug, instrument, warn};

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the path arguments. The sync root lives at a higher layer.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Converts `std::fs::Metadata` into the port representation.
pub(crate) fn to_entry_metadata(metadata: &std::fs::Metadata) -> EntryMetadata {
    let modified = metadata.modified().ok().and_then(|st| {
        st.duration_since(std::time::UNIX_EPOCH)
            .ok()
            .and_then(|dur| DateTime::<Utc>::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
    });
    if metadata.is_dir() {
        EntryMetadata::directory(modified)
    } else {
        EntryMetadata::file(metadata.len(), modified)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| StorageError::from_io(e, path.display())
}

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn open(&self, path: &Path) -> Result<ReadStream, StorageError> {
        let file = tokio::fs::File::open(path).await.map_err(io_err(path))?;
        debug!("opened for reading");
        Ok(Box::new(file))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create(&self, path: &Path) -> Result<WriteStream, StorageError> {
        let file = tokio::fs::File::create(path).await.map_err(io_err(path))?;
        debug!("opened for writing");
        Ok(Box::new(file))
    }

    async fn stat(&self, path: &Path) -> Result<EntryMetadata, StorageError> {
        let metadata = tokio::fs::metadata(path).await.map_err(io_err(path))?;
        Ok(to_entry_metadata(&metadata))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let mut entries = tokio::fs::read_dir(path).await.map_err(io_err(path))?;
        let mut out = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_err(path))? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(name = ?raw, "Skipping entry with non UTF-8 name");
                    continue;
                }
            };
            // Entries can vanish between readdir and stat.
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::from_io(e, entry.path().display())),
            };
            out.push(DirEntry::new(name, to_entry_metadata(&metadata)));
        }

        out.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(entries = out.len(), "directory listed");
        Ok(out)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn make_dir(&self, path: &Path) -> Result<(), StorageError> {
        match tokio::fs::create_dir(path).await {
            Ok(()) => {
                debug!("directory created");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let metadata = tokio::fs::metadata(path).await.map_err(io_err(path))?;
                if metadata.is_dir() {
                    Ok(())
                } else {
                    Err(StorageError::AlreadyExists(path.display().to_string()))
                }
            }
            Err(e) => Err(StorageError::from_io(e, path.display())),
        }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove(&self, path: &Path) -> Result<(), StorageError> {
        let metadata = tokio::fs::symlink_metadata(path).await.map_err(io_err(path))?;
        if metadata.is_dir() {
            debug!("removing directory");
            tokio::fs::remove_dir(path).await.map_err(io_err(path))
        } else {
            debug!("removing file");
            tokio::fs::remove_file(path).await.map_err(io_err(path))
        }
    }
}
