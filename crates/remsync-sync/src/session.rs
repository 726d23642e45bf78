//! Sync session lifecycle
//!
//! ```text
//!   Created ──start()──→ Running ──stop()──→ Stopped
//!      │                    │                  ▲
//!      │          reconcile fails              │
//!      │                    ▼                  │
//!      │                 Failed ───stop()──────┤
//!      └───────────────stop()──────────────────┘
//! ```
//!
//! `start()` spawns the workers, runs the blocking reconciliation, then
//! launches the observer in the background. `stop()` cancels the shared
//! token, closes the queue, waits (bounded) for in-flight tasks and finally
//! closes the remote connection. Stopping twice is a no-op.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use remsync_core::domain::{SessionConfig, SyncDirection};
use remsync_core::ports::{ILocalFileSystem, IRemoteStorage, StorageError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument, Span};
use uuid::Uuid;

use crate::pool::WorkerPool;
use crate::reconciler::ReconcileReport;
use crate::strategy::{self, SyncStrategy};
use crate::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    /// Reconciliation failed; workers are idle and nothing is observed
    Failed,
    Stopped,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::Running => "running",
            SessionState::Failed => "failed",
            SessionState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

pub struct SyncSession {
    id: Uuid,
    config: Arc<SessionConfig>,
    strategy: Arc<dyn SyncStrategy>,
    remote: Arc<dyn IRemoteStorage>,
    pool: Arc<WorkerPool>,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    observer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    span: Span,
}

impl SyncSession {
    /// Creates a session over already connected ports
    ///
    /// The local root is resolved to its canonical form so that paths
    /// reported by the native watcher share its prefix. In the
    /// remote-to-local direction a missing local root is created.
    pub fn new(
        config: SessionConfig,
        local_fs: Arc<dyn ILocalFileSystem>,
        remote: Arc<dyn IRemoteStorage>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        if config.direction == SyncDirection::RemoteToLocal {
            std::fs::create_dir_all(&config.local_root)
                .map_err(|e| StorageError::from_io(e, config.local_root.display()))?;
        }
        let local_root: PathBuf = std::fs::canonicalize(&config.local_root)
            .map_err(|e| StorageError::from_io(e, config.local_root.display()))?;

        let id = Uuid::new_v4();
        let span = tracing::info_span!(
            "session",
            id = %id,
            direction = %config.direction,
        );

        let strategy = strategy::for_config(&config, local_root, local_fs, remote.clone())?;
        let pool = Arc::new(WorkerPool::new(config.queue_capacity, span.clone()));

        Ok(Self {
            id,
            config: Arc::new(config),
            strategy,
            remote,
            pool,
            state: Mutex::new(SessionState::Created),
            cancel: CancellationToken::new(),
            observer: tokio::sync::Mutex::new(None),
            span,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn strategy(&self) -> &Arc<dyn SyncStrategy> {
        &self.strategy
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Token cancelled by [`SyncSession::stop`]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tasks submitted but not yet completed
    pub fn outstanding(&self) -> usize {
        self.pool.outstanding()
    }

    /// Resolves once every submitted task has completed
    pub async fn wait_idle(&self) {
        self.pool.wait().await
    }

    fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != from {
            return Err(SyncError::InvalidState { from: *state, to });
        }
        *state = to;
        Ok(())
    }

    /// Spawns workers and runs the initial reconciliation
    async fn begin(&self) -> Result<ReconcileReport, SyncError> {
        self.transition(SessionState::Created, SessionState::Running)?;
        info!(
            remote = %self.config.endpoint.display_name(),
            local_root = %self.config.local_root.display(),
            remote_root = %self.config.remote_root,
            workers = self.config.workers,
            "Starting sync session"
        );

        self.pool
            .spawn_workers(self.config.workers, self.strategy.handler());

        match self.strategy.reconcile(&self.pool, &self.cancel).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(error = %e, "Initial reconciliation failed");
                self.transition(SessionState::Running, SessionState::Failed)?;
                Err(e)
            }
        }
    }

    /// Created → Running: reconcile, then observe the authoritative side
    ///
    /// Returns once the reconciliation has finished and the observer has
    /// been launched; transfers scheduled by the reconciliation may still be
    /// running.
    ///
    /// # Errors
    /// - `SyncError::InvalidState` if the session was already started
    /// - the reconciliation or watch setup error; the session is then
    ///   `Failed` and must be stopped
    pub async fn start(&self) -> Result<ReconcileReport, SyncError> {
        async {
            let report = self.begin().await?;
            if report.cancelled {
                return Ok(report);
            }

            let handle = match self
                .strategy
                .observe(self.pool.clone(), self.cancel.clone())
                .await
            {
                Ok(handle) => handle,
                Err(e) => {
                    error!(error = %e, "Failed to start change observer");
                    self.transition(SessionState::Running, SessionState::Failed)?;
                    return Err(e);
                }
            };
            *self.observer.lock().await = Some(handle);
            info!("Sync session running");
            Ok(report)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Reconciles once, waits for the scheduled transfers and stops
    pub async fn run_once(&self) -> Result<ReconcileReport, SyncError> {
        let result = async {
            let report = self.begin().await?;
            self.pool.wait().await;
            info!(
                files_transferred = report.files_scheduled,
                "One-shot synchronization complete"
            );
            Ok(report)
        }
        .instrument(self.span.clone())
        .await;

        self.stop().await?;
        result
    }

    /// Stops the session; calling it again is a no-op
    ///
    /// In-flight transfers are not interrupted. They get up to the
    /// configured drain timeout to finish before the workers are aborted.
    pub async fn stop(&self) -> Result<(), SyncError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == SessionState::Stopped {
                return Ok(());
            }
            *state = SessionState::Stopped;
        }

        async {
            info!("Stopping sync session");
            self.cancel.cancel();

            let drain = self.config.drain_timeout;
            if let Some(observer) = self.observer.lock().await.take() {
                let abort = observer.abort_handle();
                if tokio::time::timeout(drain, observer).await.is_err() {
                    warn!("Observer did not stop in time, aborting");
                    abort.abort();
                }
            }

            self.pool.close();
            match tokio::time::timeout(drain, self.pool.join()).await {
                Ok(()) => info!("All tasks drained"),
                Err(_) => {
                    warn!(
                        outstanding = self.pool.outstanding(),
                        drain_timeout_secs = drain.as_secs(),
                        "Drain timeout elapsed, aborting workers"
                    );
                    self.pool.abort();
                }
            }

            self.remote.close().await?;
            info!("Sync session stopped");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }
}

impl std::fmt::Debug for SyncSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSession")
            .field("id", &self.id)
            .field("direction", &self.config.direction)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use remsync_core::domain::{Credentials, RemoteEndpoint, RemotePath};

    use super::*;
    use crate::dir_remote::DirRemote;
    use crate::filesystem::LocalFileSystemAdapter;

    fn session(
        direction: SyncDirection,
        local: &std::path::Path,
        remote: Arc<DirRemote>,
    ) -> SyncSession {
        let config = SessionConfig::new(
            RemoteEndpoint::new("localhost", 22, "test"),
            Credentials::Password("pw".into()),
            direction,
            local,
            RemotePath::new("/").unwrap(),
        )
        .with_workers(2)
        .with_poll_interval(Duration::from_millis(50));
        SyncSession::new(config, Arc::new(LocalFileSystemAdapter::new()), remote).unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let local = tempfile::TempDir::new().unwrap();
        let remote_dir = tempfile::TempDir::new().unwrap();
        let remote = Arc::new(DirRemote::new(remote_dir.path()));
        let s = session(SyncDirection::RemoteToLocal, local.path(), remote.clone());

        assert_eq!(s.state(), SessionState::Created);
        s.start().await.unwrap();
        assert_eq!(s.state(), SessionState::Running);

        let err = s.start().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidState { .. }));

        s.stop().await.unwrap();
        assert_eq!(s.state(), SessionState::Stopped);
        assert!(remote.is_closed());
        assert!(s.cancellation_token().is_cancelled());

        // idempotent
        s.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let local = tempfile::TempDir::new().unwrap();
        let remote_dir = tempfile::TempDir::new().unwrap();
        let remote = Arc::new(DirRemote::new(remote_dir.path()));
        let s = session(SyncDirection::LocalToRemote, local.path(), remote.clone());
        s.stop().await.unwrap();
        assert_eq!(s.state(), SessionState::Stopped);
        assert!(remote.is_closed());
    }

    #[tokio::test]
    async fn test_failed_reconcile_marks_failed() {
        let local = tempfile::TempDir::new().unwrap();
        let remote_dir = tempfile::TempDir::new().unwrap();
        // Remote root is a file: the root directory cannot be ensured.
        std::fs::write(remote_dir.path().join("blocked"), b"x").unwrap();
        let config = SessionConfig::new(
            RemoteEndpoint::new("localhost", 22, "test"),
            Credentials::Password("pw".into()),
            SyncDirection::LocalToRemote,
            local.path(),
            RemotePath::new("/blocked").unwrap(),
        );
        let s = SyncSession::new(
            config,
            Arc::new(LocalFileSystemAdapter::new()),
            Arc::new(DirRemote::new(remote_dir.path())),
        )
        .unwrap();

        assert!(s.start().await.is_err());
        assert_eq!(s.state(), SessionState::Failed);
        s.stop().await.unwrap();
        assert_eq!(s.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_missing_local_root_rejected_for_push() {
        let remote_dir = tempfile::TempDir::new().unwrap();
        let config = SessionConfig::new(
            RemoteEndpoint::new("localhost", 22, "test"),
            Credentials::Password("pw".into()),
            SyncDirection::LocalToRemote,
            "/nonexistent/remsync/local",
            RemotePath::new("/").unwrap(),
        );
        let result = SyncSession::new(
            config,
            Arc::new(LocalFileSystemAdapter::new()),
            Arc::new(DirRemote::new(remote_dir.path())),
        );
        assert!(result.is_err());
    }
}
