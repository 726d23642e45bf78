//! Initial reconciliation
//!
//! Walks the source tree top-down with an explicit work-list. Directories
//! are created on the target inline, before any descendant is looked at;
//! files whose counterpart is missing become `Create` tasks on the pool.
//!
//! Existence is the only criterion: a file present on both sides is left
//! alone even if its content or modification time differ. Live observation
//! takes care of later edits.
//!
//! Structural failures (listing a source directory, creating a target
//! directory, a stat that is neither success nor `NotFound`) abort the walk
//! with [`SyncError::Reconcile`].

use std::sync::Arc;

use remsync_core::domain::{RelativePath, Task};
use remsync_core::ports::StorageError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::filter::IgnoreFilter;
use crate::pool::WorkerPool;
use crate::retry::{with_retry, RetryPolicy};
use crate::tree::SyncTree;
use crate::SyncError;

/// Counters describing one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub directories_created: u32,
    pub files_scheduled: u32,
    /// Files already present on the target
    pub files_present: u32,
    /// Entries matched by an ignore pattern
    pub ignored: u32,
    /// The walk stopped early because the session was cancelled
    pub cancelled: bool,
}

pub struct Reconciler {
    source: Arc<dyn SyncTree>,
    target: Arc<dyn SyncTree>,
    filter: IgnoreFilter,
    retry: RetryPolicy,
}

impl Reconciler {
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

    fn abort(&self, path: &RelativePath, source: StorageError) -> SyncError {
        SyncError::Reconcile {
            path: self.target.locate(path).to_string(),
            source,
        }
    }

    /// Runs one pass, submitting transfer tasks to `pool`
    pub async fn run(
        &self,
        pool: &WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, SyncError> {
        let mut report = ReconcileReport::default();
        let root = RelativePath::root();

        if self.ensure_dir(&root).await? {
            report.directories_created += 1;
        }

        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            if cancel.is_cancelled() {
                info!("Reconciliation cancelled");
                report.cancelled = true;
                return Ok(report);
            }

            let entries = with_retry(&self.retry, "list_source", || self.source.list_dir(&dir))
                .await
                .map_err(|e| SyncError::Reconcile {
                    path: self.source.locate(&dir).to_string(),
                    source: e,
                })?;

            for entry in entries {
                let path = match dir.join(&entry.name) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(name = %entry.name, error = %e, "Skipping entry with unusable name");
                        continue;
                    }
                };
                if self.filter.is_ignored(&path) {
                    debug!(path = %path, "Ignored");
                    report.ignored += 1;
                    continue;
                }

                if entry.is_dir() {
                    if self.ensure_dir(&path).await? {
                        report.directories_created += 1;
                    }
                    pending.push(path);
                } else if self.needs_transfer(&path).await? {
                    pool.submit(Task::create(path)).await?;
                    report.files_scheduled += 1;
                } else {
                    report.files_present += 1;
                }
            }
        }

        info!(
            directories_created = report.directories_created,
            files_scheduled = report.files_scheduled,
            files_present = report.files_present,
            ignored = report.ignored,
            "Reconciliation complete"
        );
        Ok(report)
    }

    /// Makes sure `path` is a directory on the target; true if it was created
    ///
    /// A missing target root is created together with its missing parents.
    async fn ensure_dir(&self, path: &RelativePath) -> Result<bool, SyncError> {
        match with_retry(&self.retry, "stat_target", || self.target.stat(path)).await {
            Ok(m) if m.is_dir => Ok(false),
            Ok(_) => Err(self.abort(
                path,
                StorageError::NotADirectory(self.target.locate(path).to_string()),
            )),
            Err(e) if e.is_not_found() => {
                if path.is_root() {
                    with_retry(&self.retry, "make_root_parents", || {
                        self.target.make_root_parents()
                    })
                    .await
                    .map_err(|e| self.abort(path, e))?;
                }
                with_retry(&self.retry, "make_dir", || self.target.make_dir(path))
                    .await
                    .map_err(|e| self.abort(path, e))?;
                debug!(path = %path, "Created target directory");
                Ok(true)
            }
            Err(e) => Err(self.abort(path, e)),
        }
    }

    async fn needs_transfer(&self, path: &RelativePath) -> Result<bool, SyncError> {
        match with_retry(&self.retry, "stat_target", || self.target.stat(path)).await {
            Ok(m) => {
                if m.is_dir {
                    warn!(path = %path, "Target has a directory where the source has a file");
                }
                Ok(false)
            }
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(self.abort(path, e)),
        }
    }
}
