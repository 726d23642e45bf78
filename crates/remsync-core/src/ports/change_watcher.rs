//! Change notification port
//!
//! A watcher delivers [`ChangeEvent`]s for the directories registered with
//! it. Registration is non-recursive: every directory of interest is added
//! explicitly, which lets the caller own the Watch Set.

use std::path::{Path, PathBuf};

/// A change observed on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl ChangeEvent {
    /// The path the event refers to (the destination for renames)
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) | ChangeEvent::Modified(p) | ChangeEvent::Deleted(p) => p,
            ChangeEvent::Renamed { to, .. } => to,
        }
    }
}

pub trait IChangeWatcher: Send {
    /// Starts delivering events for the direct children of `path`
    ///
    /// Adding a path that is already registered renews its native watch,
    /// since a directory re-created at that path is a different inode.
    fn add_directory(&mut self, path: &Path) -> anyhow::Result<()>;

    /// Number of directories currently registered
    fn watched_count(&self) -> usize;
}
