//! Direction-specific behavior
//!
//! A [`SyncStrategy`] bundles what differs between the two directions: which
//! tree is authoritative, how its changes are observed, and how paths map
//! across. The session picks one at construction and never branches on the
//! direction again.

use std::path::PathBuf;
use std::sync::Arc;

use remsync_core::domain::{DomainError, SessionConfig, SyncDirection};
use remsync_core::ports::{ILocalFileSystem, IRemoteStorage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::filter::IgnoreFilter;
use crate::handler::{TaskHandler, TransferHandler};
use crate::poll::PollObserver;
use crate::pool::WorkerPool;
use crate::push::PushObserver;
use crate::reconciler::{ReconcileReport, Reconciler};
use crate::retry::RetryPolicy;
use crate::tree::{self, LocalTree, RemoteTree, SyncTree, TreePath};
use crate::watcher::NotifyWatcher;
use crate::SyncError;

#[async_trait::async_trait]
pub trait SyncStrategy: Send + Sync {
    fn direction(&self) -> SyncDirection;

    /// Maps a location on the authoritative side to the target side
    fn translate(&self, path: &TreePath) -> Result<TreePath, DomainError>;

    /// Maps a target location back to the authoritative side
    fn translate_back(&self, path: &TreePath) -> Result<TreePath, DomainError>;

    /// Handler applying tasks from the authoritative side to the target
    fn handler(&self) -> Arc<dyn TaskHandler>;

    async fn reconcile(
        &self,
        pool: &WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, SyncError>;

    /// Starts observing the authoritative side in the background
    async fn observe(
        &self,
        pool: Arc<WorkerPool>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, SyncError>;
}

/// Parts shared by both directions
struct Sides {
    local: Arc<LocalTree>,
    remote: Arc<RemoteTree>,
    source: Arc<dyn SyncTree>,
    target: Arc<dyn SyncTree>,
    filter: IgnoreFilter,
    retry: RetryPolicy,
}

impl Sides {
    fn handler(&self) -> Arc<dyn TaskHandler> {
        Arc::new(TransferHandler::new(
            self.source.clone(),
            self.target.clone(),
            self.filter.clone(),
            self.retry,
        ))
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.source.clone(),
            self.target.clone(),
            self.filter.clone(),
            self.retry,
        )
    }

    fn translate(&self, path: &TreePath) -> Result<TreePath, DomainError> {
        tree::translate(self.source.as_ref(), self.target.as_ref(), path)
    }

    fn translate_back(&self, path: &TreePath) -> Result<TreePath, DomainError> {
        tree::translate(self.target.as_ref(), self.source.as_ref(), path)
    }
}

// ============================================================================
// PushStrategy (local to remote)
// ============================================================================

pub struct PushStrategy {
    sides: Sides,
}

#[async_trait::async_trait]
impl SyncStrategy for PushStrategy {
    fn direction(&self) -> SyncDirection {
        SyncDirection::LocalToRemote
    }

    fn translate(&self, path: &TreePath) -> Result<TreePath, DomainError> {
        self.sides.translate(path)
    }

    fn translate_back(&self, path: &TreePath) -> Result<TreePath, DomainError> {
        self.sides.translate_back(path)
    }

    fn handler(&self) -> Arc<dyn TaskHandler> {
        self.sides.handler()
    }

    async fn reconcile(
        &self,
        pool: &WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, SyncError> {
        self.sides.reconciler().run(pool, cancel).await
    }

    async fn observe(
        &self,
        pool: Arc<WorkerPool>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, SyncError> {
        let (watcher, events) =
            NotifyWatcher::new().map_err(|e| SyncError::Watch(format!("{e:#}")))?;
        let mut observer = PushObserver::new(
            self.sides.local.clone(),
            Box::new(watcher),
            events,
            self.sides.filter.clone(),
            pool,
        );
        observer.register_all().await?;
        Ok(tokio::spawn(
            observer.run(cancel).instrument(Span::current()),
        ))
    }
}

// ============================================================================
// PullStrategy (remote to local)
// ============================================================================

pub struct PullStrategy {
    sides: Sides,
    poll_interval: std::time::Duration,
}

#[async_trait::async_trait]
impl SyncStrategy for PullStrategy {
    fn direction(&self) -> SyncDirection {
        SyncDirection::RemoteToLocal
    }

    fn translate(&self, path: &TreePath) -> Result<TreePath, DomainError> {
        self.sides.translate(path)
    }

    fn translate_back(&self, path: &TreePath) -> Result<TreePath, DomainError> {
        self.sides.translate_back(path)
    }

    fn handler(&self) -> Arc<dyn TaskHandler> {
        self.sides.handler()
    }

    async fn reconcile(
        &self,
        pool: &WorkerPool,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport, SyncError> {
        self.sides.reconciler().run(pool, cancel).await
    }

    async fn observe(
        &self,
        pool: Arc<WorkerPool>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, SyncError> {
        let observer = PollObserver::new(
            self.sides.remote.clone(),
            self.sides.filter.clone(),
            self.sides.retry,
            self.poll_interval,
            pool,
        );
        Ok(tokio::spawn(
            observer.run(cancel).instrument(Span::current()),
        ))
    }
}

/// Builds the strategy matching `config.direction`
///
/// `local_root` overrides `config.local_root`, typically with its
/// canonical form.
pub fn for_config(
    config: &SessionConfig,
    local_root: PathBuf,
    local_fs: Arc<dyn ILocalFileSystem>,
    remote: Arc<dyn IRemoteStorage>,
) -> Result<Arc<dyn SyncStrategy>, SyncError> {
    let local = Arc::new(LocalTree::new(local_root, local_fs));
    let remote = Arc::new(RemoteTree::new(config.remote_root.clone(), remote));
    let filter = IgnoreFilter::new(&config.ignore)?;
    let retry = RetryPolicy::from_config(config);

    let strategy: Arc<dyn SyncStrategy> = match config.direction {
        SyncDirection::LocalToRemote => Arc::new(PushStrategy {
            sides: Sides {
                source: local.clone(),
                target: remote.clone(),
                local,
                remote,
                filter,
                retry,
            },
        }),
        SyncDirection::RemoteToLocal => Arc::new(PullStrategy {
            sides: Sides {
                source: remote.clone(),
                target: local.clone(),
                local,
                remote,
                filter,
                retry,
            },
            poll_interval: config.poll_interval,
        }),
    };
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use remsync_core::domain::{Credentials, RemoteEndpoint, RemotePath};

    use super::*;
    use crate::dir_remote::DirRemote;
    use crate::filesystem::LocalFileSystemAdapter;

    fn strategy(direction: SyncDirection) -> Arc<dyn SyncStrategy> {
        let config = SessionConfig::new(
            RemoteEndpoint::new("localhost", 22, "test"),
            Credentials::Password("pw".into()),
            direction,
            "/data/local",
            RemotePath::new("/data/remote").unwrap(),
        );
        for_config(
            &config,
            PathBuf::from("/data/local"),
            Arc::new(LocalFileSystemAdapter::new()),
            Arc::new(DirRemote::new("/nonexistent")),
        )
        .unwrap()
    }

    #[test]
    fn test_direction_selects_source_side() {
        let push = strategy(SyncDirection::LocalToRemote);
        assert_eq!(push.direction(), SyncDirection::LocalToRemote);
        let out = push
            .translate(&TreePath::Local(PathBuf::from("/data/local/a/b.txt")))
            .unwrap();
        assert_eq!(out, TreePath::Remote(RemotePath::new("/data/remote/a/b.txt").unwrap()));

        let pull = strategy(SyncDirection::RemoteToLocal);
        let out = pull
            .translate(&TreePath::Remote(RemotePath::new("/data/remote/a/b.txt").unwrap()))
            .unwrap();
        assert_eq!(out, TreePath::Local(PathBuf::from("/data/local/a/b.txt")));
    }

    #[test]
    fn test_translate_round_trip() {
        for direction in [SyncDirection::LocalToRemote, SyncDirection::RemoteToLocal] {
            let s = strategy(direction);
            let p = match direction {
                SyncDirection::LocalToRemote => {
                    TreePath::Local(PathBuf::from("/data/local/deep/er/f.bin"))
                }
                SyncDirection::RemoteToLocal => {
                    TreePath::Remote(RemotePath::new("/data/remote/deep/er/f.bin").unwrap())
                }
            };
            let there = s.translate(&p).unwrap();
            assert_eq!(s.translate_back(&there).unwrap(), p);
        }
    }

    #[test]
    fn test_translate_rejects_target_side_input() {
        let push = strategy(SyncDirection::LocalToRemote);
        let remote = TreePath::Remote(RemotePath::new("/data/remote/a").unwrap());
        assert!(push.translate(&remote).is_err());
    }
}
