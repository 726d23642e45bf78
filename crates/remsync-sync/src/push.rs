//! Push-mode change observer (local source)
//!
//! Registers every local directory with the native watcher at startup and
//! forwards change events to the worker pool, one task per event. A
//! directory that appears later (created or moved in) is registered on the
//! fly together with its subdirectories, and files already inside it are
//! submitted since their own events may have fired before the watch existed.

use std::path::Path;
use std::sync::Arc;

use remsync_core::domain::{RelativePath, Task};
use remsync_core::ports::{ChangeEvent, IChangeWatcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::filter::IgnoreFilter;
use crate::pool::WorkerPool;
use crate::tree::{LocalTree, SyncTree, TreePath};
use crate::SyncError;

pub struct PushObserver {
    tree: Arc<LocalTree>,
    watcher: Box<dyn IChangeWatcher>,
    events: mpsc::Receiver<ChangeEvent>,
    filter: IgnoreFilter,
    pool: Arc<WorkerPool>,
}

impl PushObserver {
    pub fn new(
        tree: Arc<LocalTree>,
        watcher: Box<dyn IChangeWatcher>,
        events: mpsc::Receiver<ChangeEvent>,
        filter: IgnoreFilter,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            tree,
            watcher,
            events,
            filter,
            pool,
        }
    }

    /// Registers the root and every directory below it
    pub async fn register_all(&mut self) -> Result<(), SyncError> {
        self.register_subtree(&RelativePath::root()).await?;
        info!(watched = self.watcher.watched_count(), "Watch set registered");
        Ok(())
    }

    pub fn watched_count(&self) -> usize {
        self.watcher.watched_count()
    }

    /// Watches `dir` and its subdirectories; returns the files found
    async fn register_subtree(
        &mut self,
        dir: &RelativePath,
    ) -> Result<Vec<RelativePath>, SyncError> {
        let mut files = Vec::new();
        let mut pending = vec![dir.clone()];

        while let Some(current) = pending.pop() {
            let path = current.to_local(self.tree.root());
            self.watcher
                .add_directory(&path)
                .map_err(|e| SyncError::Watch(format!("{e:#}")))?;

            let entries = match self.tree.list_dir(&current).await {
                Ok(entries) => entries,
                // Removed again before we got to list it.
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let child = current.join(&entry.name)?;
                if self.filter.is_ignored(&child) {
                    continue;
                }
                if entry.is_dir() {
                    pending.push(child);
                } else {
                    files.push(child);
                }
            }
        }
        Ok(files)
    }

    /// Forwards events until cancelled or the watcher goes away
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(event) => event,
                    None => {
                        warn!("Watcher channel closed");
                        break;
                    }
                },
            };

            match self.handle_event(event).await {
                Ok(()) => {}
                Err(SyncError::PoolClosed) => break,
                Err(e) => warn!(error = %e, "Failed to handle change event"),
            }
        }
        debug!("Push observer stopped");
    }

    fn relative(&self, path: &Path) -> Option<RelativePath> {
        match self.tree.relativize(&TreePath::Local(path.to_path_buf())) {
            Ok(rel) if !rel.is_root() => Some(rel),
            Ok(_) => None,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Event outside sync root");
                None
            }
        }
    }

    async fn handle_event(&mut self, event: ChangeEvent) -> Result<(), SyncError> {
        debug!(event = ?event, "Change event");
        match event {
            ChangeEvent::Created(path) => {
                if let Some(rel) = self.relative(&path) {
                    self.on_created(rel).await?;
                }
            }
            ChangeEvent::Modified(path) => {
                if let Some(rel) = self.relative(&path) {
                    if self.filter.is_ignored(&rel) || is_dir(&self.tree, &rel).await {
                        return Ok(());
                    }
                    self.pool.submit(Task::write(rel)).await?;
                }
            }
            ChangeEvent::Deleted(path) => {
                if let Some(rel) = self.relative(&path) {
                    if !self.filter.is_ignored(&rel) {
                        self.pool.submit(Task::remove(rel)).await?;
                    }
                }
            }
            ChangeEvent::Renamed { from, to } => {
                match (self.relative(&from), self.relative(&to)) {
                    (Some(from), Some(to)) => {
                        if self.filter.is_ignored(&to) {
                            self.pool.submit(Task::remove(from)).await?;
                            return Ok(());
                        }
                        let files = if is_dir(&self.tree, &to).await {
                            self.register_subtree(&to).await?
                        } else {
                            Vec::new()
                        };
                        self.pool.submit(Task::rename(from, to)).await?;
                        for file in files {
                            self.pool.submit(Task::create(file)).await?;
                        }
                    }
                    (None, Some(to)) => self.on_created(to).await?,
                    (Some(from), None) => self.pool.submit(Task::remove(from)).await?,
                    (None, None) => {}
                }
            }
        }
        Ok(())
    }

    async fn on_created(&mut self, rel: RelativePath) -> Result<(), SyncError> {
        if self.filter.is_ignored(&rel) {
            return Ok(());
        }
        if is_dir(&self.tree, &rel).await {
            let files = self.register_subtree(&rel).await?;
            debug!(path = %rel, files = files.len(), "New directory registered");
            self.pool.submit(Task::create(rel)).await?;
            for file in files {
                self.pool.submit(Task::create(file)).await?;
            }
        } else {
            self.pool.submit(Task::create(rel)).await?;
        }
        Ok(())
    }
}

async fn is_dir(tree: &LocalTree, rel: &RelativePath) -> bool {
    matches!(tree.stat(rel).await, Ok(m) if m.is_dir)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use tracing::Span;

    use super::*;
    use crate::filesystem::LocalFileSystemAdapter;

    /// Records registrations instead of watching
    #[derive(Clone, Default)]
    struct RecordingWatcher {
        dirs: Arc<Mutex<HashSet<PathBuf>>>,
        calls: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl IChangeWatcher for RecordingWatcher {
        fn add_directory(&mut self, path: &Path) -> anyhow::Result<()> {
            self.dirs.lock().unwrap().insert(path.to_path_buf());
            self.calls.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        fn watched_count(&self) -> usize {
            self.dirs.lock().unwrap().len()
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        watcher: RecordingWatcher,
        observer: PushObserver,
        pool: Arc<WorkerPool>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::TempDir::new().unwrap();
        let tree = Arc::new(LocalTree::new(
            dir.path(),
            Arc::new(LocalFileSystemAdapter::new()),
        ));
        let watcher = RecordingWatcher::default();
        let (_tx, rx) = mpsc::channel(8);
        let pool = Arc::new(WorkerPool::new(64, Span::none()));
        let observer = PushObserver::new(
            tree,
            Box::new(watcher.clone()),
            rx,
            IgnoreFilter::new(&["*.swp"]).unwrap(),
            pool.clone(),
        );
        Fixture {
            dir,
            watcher,
            observer,
            pool,
        }
    }

    #[tokio::test]
    async fn test_register_all_watches_every_directory() {
        let mut fx = fixture();
        std::fs::create_dir_all(fx.dir.path().join("a/b")).unwrap();
        std::fs::create_dir_all(fx.dir.path().join("c")).unwrap();

        fx.observer.register_all().await.unwrap();

        let dirs = fx.watcher.dirs.lock().unwrap().clone();
        assert_eq!(dirs.len(), 4);
        assert!(dirs.contains(&fx.dir.path().join("a/b")));
    }

    #[tokio::test]
    async fn test_file_events_map_one_to_one() {
        let mut fx = fixture();
        std::fs::write(fx.dir.path().join("f.txt"), b"x").unwrap();

        let root = fx.dir.path().to_path_buf();
        fx.observer
            .handle_event(ChangeEvent::Created(root.join("f.txt")))
            .await
            .unwrap();
        fx.observer
            .handle_event(ChangeEvent::Modified(root.join("f.txt")))
            .await
            .unwrap();
        fx.observer
            .handle_event(ChangeEvent::Deleted(root.join("f.txt")))
            .await
            .unwrap();

        assert_eq!(fx.pool.outstanding(), 3);
    }

    #[tokio::test]
    async fn test_new_directory_grows_watch_set() {
        let mut fx = fixture();
        fx.observer.register_all().await.unwrap();
        assert_eq!(fx.observer.watched_count(), 1);

        std::fs::create_dir_all(fx.dir.path().join("n/m")).unwrap();
        std::fs::write(fx.dir.path().join("n/m/early.txt"), b"x").unwrap();
        fx.observer
            .handle_event(ChangeEvent::Created(fx.dir.path().join("n")))
            .await
            .unwrap();

        assert_eq!(fx.observer.watched_count(), 3);
        // directory itself plus the file found inside
        assert_eq!(fx.pool.outstanding(), 2);
    }

    #[tokio::test]
    async fn test_recreated_directory_is_registered_again() {
        let mut fx = fixture();
        std::fs::create_dir_all(fx.dir.path().join("d/e")).unwrap();
        fx.observer.register_all().await.unwrap();
        assert_eq!(fx.observer.watched_count(), 3);

        std::fs::remove_dir_all(fx.dir.path().join("d")).unwrap();
        fx.observer
            .handle_event(ChangeEvent::Deleted(fx.dir.path().join("d")))
            .await
            .unwrap();
        std::fs::create_dir(fx.dir.path().join("d")).unwrap();
        fx.observer
            .handle_event(ChangeEvent::Created(fx.dir.path().join("d")))
            .await
            .unwrap();

        assert_eq!(fx.observer.watched_count(), 3);
        let d = fx.dir.path().join("d");
        let calls = fx.watcher.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|p| **p == d).count(), 2);
    }

    #[tokio::test]
    async fn test_ignored_and_outside_events_dropped() {
        let mut fx = fixture();
        std::fs::write(fx.dir.path().join(".x.swp"), b"x").unwrap();
        fx.observer
            .handle_event(ChangeEvent::Created(fx.dir.path().join(".x.swp")))
            .await
            .unwrap();
        fx.observer
            .handle_event(ChangeEvent::Created(PathBuf::from("/elsewhere/file")))
            .await
            .unwrap();
        assert_eq!(fx.pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_rename_out_of_root_is_remove() {
        let mut fx = fixture();
        fx.observer
            .handle_event(ChangeEvent::Renamed {
                from: fx.dir.path().join("a.txt"),
                to: PathBuf::from("/elsewhere/a.txt"),
            })
            .await
            .unwrap();
        assert_eq!(fx.pool.outstanding(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let fx = fixture();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(fx.observer.run(cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
