//! Native file watching
//!
//! [`NotifyWatcher`] wraps the `notify` crate and implements the
//! [`IChangeWatcher`] port. Every directory is registered non-recursively;
//! the push observer decides which directories to add.
//!
//! ## Architecture
//!
//! ```text
//! inotify / kqueue / ReadDirectoryChangesW
//!       │
//!       ▼
//!  NotifyWatcher  ──→  mpsc::channel  ──→  PushObserver  ──→  WorkerPool
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use remsync_core::ports::{ChangeEvent, IChangeWatcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacity of the event channel between the OS callback and the observer
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct NotifyWatcher {
    watcher: RecommendedWatcher,
    /// The watch set; grows only
    watched: HashSet<PathBuf>,
}

impl NotifyWatcher {
    /// Creates a watcher and the receiver its events are delivered to
    ///
    /// # Errors
    /// Returns an error if the underlying OS watcher cannot be created
    pub fn new() -> Result<(Self, mpsc::Receiver<ChangeEvent>)> {
        let (tx, rx) = mpsc::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(change) = map_notify_event(&event) {
                        if let Err(e) = tx.blocking_send(change) {
                            warn!(error = %e, "Failed to send change event (receiver dropped)");
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )
        .context("Failed to create file watcher")?;

        info!("File watcher initialized");
        Ok((
            Self {
                watcher,
                watched: HashSet::new(),
            },
            rx,
        ))
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }
}

impl IChangeWatcher for NotifyWatcher {
    fn add_directory(&mut self, path: &Path) -> Result<()> {
        let result = self.watcher.watch(path, RecursiveMode::NonRecursive);
        if self.watched.contains(path) {
            if let Err(e) = result {
                debug!(path = %path.display(), error = %e, "Failed to renew watch");
            }
            return Ok(());
        }
        result.with_context(|| format!("Failed to watch path: {}", path.display()))?;
        self.watched.insert(path.to_path_buf());
        debug!(path = %path.display(), watched = self.watched.len(), "Directory watched");
        Ok(())
    }

    fn watched_count(&self) -> usize {
        self.watched.len()
    }
}

/// Converts a `notify::Event` into a [`ChangeEvent`]
///
/// - `Create(*)` -> `Created`
/// - `Modify(Name(Both))` with 2 paths -> `Renamed`
/// - `Modify(Name(From))` -> `Deleted`
/// - `Modify(Name(To))` -> `Created`
/// - other `Modify(*)` -> `Modified`
/// - `Remove(*)` -> `Deleted`
///
/// Access and unknown events are dropped.
pub(crate) fn map_notify_event(event: &notify::Event) -> Option<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => Some(ChangeEvent::Created(paths.first()?.clone())),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if paths.len() >= 2 {
                Some(ChangeEvent::Renamed {
                    from: paths[0].clone(),
                    to: paths[1].clone(),
                })
            } else {
                debug!("Rename with single path, treating as Modified");
                Some(ChangeEvent::Modified(paths.first()?.clone()))
            }
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            Some(ChangeEvent::Deleted(paths.first()?.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            Some(ChangeEvent::Created(paths.first()?.clone()))
        }

        EventKind::Modify(_) => Some(ChangeEvent::Modified(paths.first()?.clone())),

        EventKind::Remove(_) => Some(ChangeEvent::Deleted(paths.first()?.clone())),

        _ => {
            debug!(kind = ?event.kind, "Ignoring event kind");
            None
        }
    }
}
