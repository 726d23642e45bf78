//! Poll-diff change observer (remote source)
//!
//! Remote protocols rarely push change notifications, so the observer lists
//! the whole source tree every interval and diffs the result against the
//! previous listing:
//!
//! - a file that is new, or whose modification time is strictly later, is a
//!   `Write`
//! - a file that disappeared is a `Remove`
//!
//! The first cycle only seeds the snapshot. A cycle whose walk fails emits
//! nothing and keeps the previous snapshot, so a transient listing error
//! never looks like mass deletion.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use remsync_core::domain::{RelativePath, Task};
use remsync_core::ports::StorageError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::filter::IgnoreFilter;
use crate::pool::WorkerPool;
use crate::retry::{with_retry, RetryPolicy};
use crate::tree::SyncTree;
use crate::SyncError;

/// Relative file path to last observed modification time
pub type Snapshot = BTreeMap<RelativePath, Option<DateTime<Utc>>>;

/// Computes the tasks that turn `prev` into `next`
///
/// Writes come first, then removes, each in path order.
pub fn diff_snapshots(prev: &Snapshot, next: &Snapshot) -> Vec<Task> {
    let writes = next.iter().filter_map(|(path, mtime)| match prev.get(path) {
        None => Some(Task::write(path.clone())),
        Some(prev_mtime) if mtime > prev_mtime => Some(Task::write(path.clone())),
        Some(_) => None,
    });
    let removes = prev
        .keys()
        .filter(|path| !next.contains_key(*path))
        .map(|path| Task::remove(path.clone()));
    writes.chain(removes).collect()
}

pub struct PollObserver {
    tree: Arc<dyn SyncTree>,
    filter: IgnoreFilter,
    retry: RetryPolicy,
    interval: Duration,
    pool: Arc<WorkerPool>,
    previous: Option<Snapshot>,
}

impl PollObserver {
    pub fn new(
        tree: Arc<dyn SyncTree>,
        filter: IgnoreFilter,
        retry: RetryPolicy,
        interval: Duration,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            tree,
            filter,
            retry,
            interval,
            pool,
            previous: None,
        }
    }

    /// Lists every file below the root
    pub async fn walk(&self) -> Result<Snapshot, StorageError> {
        let mut snapshot = Snapshot::new();
        let mut pending = vec![RelativePath::root()];

        while let Some(dir) = pending.pop() {
            let entries =
                with_retry(&self.retry, "list_source", || self.tree.list_dir(&dir)).await?;
            for entry in entries {
                let Ok(path) = dir.join(&entry.name) else {
                    warn!(name = %entry.name, "Skipping entry with unusable name");
                    continue;
                };
                if self.filter.is_ignored(&path) {
                    continue;
                }
                if entry.is_dir() {
                    pending.push(path);
                } else {
                    snapshot.insert(path, entry.metadata.modified);
                }
            }
        }
        Ok(snapshot)
    }

    /// Runs one cycle and returns the tasks it produced
    pub async fn poll_once(&mut self) -> Result<Vec<Task>, StorageError> {
        let next = self.walk().await?;
        let tasks = match &self.previous {
            Some(prev) => diff_snapshots(prev, &next),
            None => {
                debug!(files = next.len(), "Seeded remote snapshot");
                Vec::new()
            }
        };
        self.previous = Some(next);
        Ok(tasks)
    }

    /// Polls until cancelled; cancellation is checked before every cycle
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "Remote polling started");
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.poll_once().await {
                Ok(tasks) => {
                    if !tasks.is_empty() {
                        debug!(tasks = tasks.len(), "Remote changes detected");
                    }
                    for task in tasks {
                        match self.pool.submit(task).await {
                            Ok(()) => {}
                            Err(SyncError::PoolClosed) => return,
                            Err(e) => warn!(error = %e, "Failed to submit task"),
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Poll cycle failed, keeping previous snapshot"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Poll observer stopped");
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use remsync_core::domain::{RemotePath, TaskKind};
    use tracing::Span;

    use super::*;
    use crate::dir_remote::DirRemote;
    use crate::tree::RemoteTree;

    fn rel(s: &str) -> RelativePath {
        RelativePath::new(s).unwrap()
    }

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Some(Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn summary(tasks: &[Task]) -> Vec<(TaskKind, String)> {
        tasks
            .iter()
            .map(|t| (t.kind, t.path.as_str().to_string()))
            .collect()
    }

    #[test]
    fn test_diff_write_write_remove() {
        let s1: Snapshot = [(rel("a"), at(0)), (rel("b"), at(0))].into_iter().collect();
        let s2: Snapshot = [(rel("a"), at(10)), (rel("c"), at(0))].into_iter().collect();

        let tasks = diff_snapshots(&s1, &s2);
        assert_eq!(
            summary(&tasks),
            vec![
                (TaskKind::Write, "a".to_string()),
                (TaskKind::Write, "c".to_string()),
                (TaskKind::Remove, "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_diff_ignores_older_or_equal_mtime() {
        let s1: Snapshot = [(rel("a"), at(10)), (rel("b"), at(10))].into_iter().collect();
        let s2: Snapshot = [(rel("a"), at(10)), (rel("b"), at(5))].into_iter().collect();
        assert!(diff_snapshots(&s1, &s2).is_empty());
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let s: Snapshot = [(rel("x/y"), at(1))].into_iter().collect();
        assert!(diff_snapshots(&s, &s).is_empty());
    }

    fn observer(base: &std::path::Path, interval: Duration) -> PollObserver {
        let tree = Arc::new(RemoteTree::new(
            RemotePath::new("/").unwrap(),
            Arc::new(DirRemote::new(base)),
        ));
        PollObserver::new(
            tree,
            IgnoreFilter::new(&["*.swp"]).unwrap(),
            RetryPolicy::default(),
            interval,
            Arc::new(WorkerPool::new(64, Span::none())),
        )
    }

    #[tokio::test]
    async fn test_walk_lists_files_only() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/empty")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"y").unwrap();
        std::fs::write(dir.path().join("sub/.b.txt.swp"), b"z").unwrap();

        let snapshot = observer(dir.path(), Duration::from_secs(1)).walk().await.unwrap();
        let paths: Vec<&str> = snapshot.keys().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "sub/b.txt"]);
    }

    #[tokio::test]
    async fn test_first_cycle_only_seeds() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();

        let mut obs = observer(dir.path(), Duration::from_secs(1));
        assert!(obs.poll_once().await.unwrap().is_empty());

        std::fs::write(dir.path().join("c.txt"), b"new").unwrap();
        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        let tasks = obs.poll_once().await.unwrap();
        assert_eq!(
            summary(&tasks),
            vec![
                (TaskKind::Write, "c.txt".to_string()),
                (TaskKind::Remove, "a.txt".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_walk_keeps_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        let mut obs = observer(&dir.path().join("missing"), Duration::from_secs(1));
        assert!(obs.poll_once().await.is_err());
        assert!(obs.previous.is_none());
    }

    #[tokio::test]
    async fn test_cancel_exits_during_sleep() {
        let dir = tempfile::TempDir::new().unwrap();
        let obs = observer(dir.path(), Duration::from_secs(3600));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(obs.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
