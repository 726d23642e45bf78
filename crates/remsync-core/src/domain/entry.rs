//! Directory entries and metadata returned by the storage ports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a single filesystem entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub is_dir: bool,
    pub size: u64,
    /// Last modification time, when the backend reports one
    pub modified: Option<DateTime<Utc>>,
}

impl EntryMetadata {
    pub fn file(size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            is_dir: false,
            size,
            modified,
        }
    }

    pub fn directory(modified: Option<DateTime<Utc>>) -> Self {
        Self {
            is_dir: true,
            size: 0,
            modified,
        }
    }
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name, a single path segment
    pub name: String,
    pub metadata: EntryMetadata,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, metadata: EntryMetadata) -> Self {
        Self {
            name: name.into(),
            metadata,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir
    }
}
