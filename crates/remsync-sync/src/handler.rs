//! Applying tasks to the target tree
//!
//! [`TransferHandler`] converges one path of the target towards the source:
//!
//! | Task | Source state | Effect on target |
//! |---|---|---|
//! | Create / Write | file | copy content (parents created on demand) |
//! | Create / Write | directory | `make_dir` |
//! | Create / Write | missing | remove counterpart |
//! | Remove | any | remove counterpart, recursively for directories |
//! | Rename | any | apply `path` as Create, then remove `previous` |
//!
//! Transport failures are retried per operation according to the
//! [`RetryPolicy`]; an exhausted budget fails the task, which the pool logs
//! and drops.

use std::sync::Arc;

use remsync_core::domain::{RelativePath, Task, TaskKind};
use remsync_core::ports::StorageError;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::filter::IgnoreFilter;
use crate::retry::{with_retry, RetryPolicy};
use crate::tree::SyncTree;
use crate::SyncError;

/// Executes a single task on behalf of a worker
#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<(), SyncError>;
}

pub struct TransferHandler {
    source: Arc<dyn SyncTree>,
    target: Arc<dyn SyncTree>,
    filter: IgnoreFilter,
    retry: RetryPolicy,
}

impl TransferHandler {
    pub fn new(
        source: Arc<dyn SyncTree>,
        target: Arc<dyn SyncTree>,
        filter: IgnoreFilter,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            target,
            filter,
            retry,
        }
    }

    /// Makes the target entry at `path` mirror the source entry
    async fn upsert(&self, path: &RelativePath) -> Result<(), SyncError> {
        if self.filter.is_ignored(path) {
            debug!(path = %path, "Ignored path, skipping");
            return Ok(());
        }

        let metadata = match with_retry(&self.retry, "stat_source", || self.source.stat(path)).await
        {
            Ok(m) => m,
            Err(e) if e.is_not_found() => {
                debug!(path = %path, "Source vanished, removing counterpart");
                return self.remove_target(path).await;
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir {
            self.ensure_dir(path).await
        } else {
            self.copy_file(path).await
        }
    }

    /// Creates `path` on the target, creating missing ancestors first
    async fn ensure_dir(&self, path: &RelativePath) -> Result<(), SyncError> {
        for dir in path.ancestors().iter().chain(std::iter::once(path)) {
            with_retry(&self.retry, "make_dir", || self.target.make_dir(dir)).await?;
        }
        debug!(path = %path, "Directory ensured");
        Ok(())
    }

    async fn copy_file(&self, path: &RelativePath) -> Result<(), SyncError> {
        let bytes = with_retry(&self.retry, "copy_file", || self.copy_once(path)).await?;
        info!(
            path = %path,
            from = %self.source.locate(path),
            to = %self.target.locate(path),
            bytes,
            "File transferred"
        );
        Ok(())
    }

    async fn copy_once(&self, path: &RelativePath) -> Result<u64, StorageError> {
        let mut reader = self.source.open(path).await?;
        let mut writer = match self.target.create(path).await {
            Ok(w) => w,
            Err(e) if e.is_not_found() && !path.ancestors().is_empty() => {
                for dir in path.ancestors() {
                    self.target.make_dir(&dir).await?;
                }
                self.target.create(path).await?
            }
            Err(e) => return Err(e),
        };

        let target = self.target.locate(path);
        let bytes = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|e| StorageError::from_io(e, &target))?;
        writer
            .shutdown()
            .await
            .map_err(|e| StorageError::from_io(e, &target))?;
        Ok(bytes)
    }

    /// Removes the counterpart of `path`; absence is success
    async fn remove_target(&self, path: &RelativePath) -> Result<(), SyncError> {
        if path.is_root() {
            debug!("Refusing to remove the target root");
            return Ok(());
        }
        let metadata = match with_retry(&self.retry, "stat_target", || self.target.stat(path)).await
        {
            Ok(m) => m,
            Err(e) if e.is_not_found() => {
                debug!(path = %path, "Counterpart already absent");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir {
            self.remove_tree(path).await?;
        } else {
            self.remove_one(path).await?;
        }
        info!(path = %path, target = %self.target.locate(path), "Removed from target");
        Ok(())
    }

    async fn remove_one(&self, path: &RelativePath) -> Result<(), SyncError> {
        match with_retry(&self.retry, "remove", || self.target.remove(path)).await {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Removes a target directory and everything below it
    async fn remove_tree(&self, root: &RelativePath) -> Result<(), SyncError> {
        let mut pending = vec![root.clone()];
        let mut dirs = Vec::new();

        while let Some(dir) = pending.pop() {
            let entries =
                match with_retry(&self.retry, "list_dir", || self.target.list_dir(&dir)).await {
                    Ok(entries) => entries,
                    Err(e) if e.is_not_found() => continue,
                    Err(e) => return Err(e.into()),
                };
            for entry in entries {
                let child = dir.join(&entry.name)?;
                if entry.is_dir() {
                    pending.push(child);
                } else {
                    self.remove_one(&child).await?;
                }
            }
            dirs.push(dir);
        }

        // Deepest directories were discovered last.
        for dir in dirs.iter().rev() {
            self.remove_one(dir).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl TaskHandler for TransferHandler {
    #[instrument(skip(self), fields(task_id = %task.id, kind = %task.kind, path = %task.path))]
    async fn handle(&self, task: &Task) -> Result<(), SyncError> {
        match task.kind {
            TaskKind::Create | TaskKind::Write => self.upsert(&task.path).await,
            TaskKind::Remove => {
                if self.filter.is_ignored(&task.path) {
                    return Ok(());
                }
                self.remove_target(&task.path).await
            }
            TaskKind::Rename => {
                self.upsert(&task.path).await?;
                match &task.previous {
                    Some(previous) if previous != &task.path => {
                        self.remove_target(previous).await
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}
