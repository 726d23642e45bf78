//! Bounded task queue drained by a fixed set of workers
//!
//! ## Flow
//!
//! ```text
//! Reconciler ─┐
//!             ├──→ submit ──→ async_channel (bounded) ──→ worker × N ──→ TaskHandler
//! Observer  ──┘
//! ```
//!
//! The outstanding counter is incremented before a task is enqueued and
//! decremented once its handler returns, whatever the outcome. `wait()`
//! resolves when the counter reaches zero. Workers only exit when the queue
//! is closed and empty.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use remsync_core::domain::Task;
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn, Instrument, Span};

use crate::handler::TaskHandler;
use crate::locks::PathLocks;
use crate::SyncError;

#[derive(Debug, Default)]
struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    fn increment(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn decrement(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Decrements the outstanding counter when dropped, so a panicking handler
/// cannot leave `wait()` hanging.
struct Completion(Arc<Outstanding>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

pub struct WorkerPool {
    tx: async_channel::Sender<Task>,
    rx: async_channel::Receiver<Task>,
    outstanding: Arc<Outstanding>,
    locks: PathLocks,
    workers: Mutex<Vec<JoinHandle<()>>>,
    aborts: Mutex<Vec<AbortHandle>>,
    span: Span,
}

impl WorkerPool {
    /// Creates a pool whose queue holds at most `capacity` tasks
    ///
    /// No worker runs until [`WorkerPool::spawn_workers`] is called.
    pub fn new(capacity: usize, span: Span) -> Self {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            outstanding: Arc::new(Outstanding::default()),
            locks: PathLocks::new(),
            workers: Mutex::new(Vec::new()),
            aborts: Mutex::new(Vec::new()),
            span,
        }
    }

    /// Spawns `count` workers that feed tasks to `handler`
    pub fn spawn_workers(&self, count: usize, handler: Arc<dyn TaskHandler>) {
        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        let mut aborts = self.aborts.lock().unwrap_or_else(|e| e.into_inner());
        for worker_id in 0..count {
            let rx = self.rx.clone();
            let outstanding = self.outstanding.clone();
            let locks = self.locks.clone();
            let handler = handler.clone();
            let span = tracing::debug_span!(parent: &self.span, "worker", worker_id);
            let worker = tokio::spawn(worker_loop(rx, outstanding, locks, handler).instrument(span));
            aborts.push(worker.abort_handle());
            workers.push(worker);
        }
        debug!(parent: &self.span, workers = count, "Workers started");
    }

    /// Enqueues a task, waiting while the queue is full
    ///
    /// # Errors
    /// Returns `SyncError::PoolClosed` once [`WorkerPool::close`] was called
    pub async fn submit(&self, task: Task) -> Result<(), SyncError> {
        self.outstanding.increment();
        debug!(parent: &self.span, task = %task, "Task submitted");
        if self.tx.send(task).await.is_err() {
            self.outstanding.decrement();
            return Err(SyncError::PoolClosed);
        }
        Ok(())
    }

    /// Resolves once no submitted task is pending or running
    ///
    /// New submissions are still accepted while waiting.
    pub async fn wait(&self) {
        loop {
            let notified = self.outstanding.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Tasks submitted but not yet completed
    pub fn outstanding(&self) -> usize {
        self.outstanding.count.load(Ordering::Acquire)
    }

    /// Stops accepting tasks; queued tasks are still drained by the workers
    pub fn close(&self) {
        if self.tx.close() {
            debug!(parent: &self.span, queued = self.tx.len(), "Task queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Waits for every worker to exit (requires [`WorkerPool::close`])
    pub async fn join(&self) {
        let workers =
            std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        for worker in workers {
            if let Err(e) = worker.await {
                if e.is_panic() {
                    warn!(parent: &self.span, error = %e, "Worker panicked");
                }
            }
        }
    }

    /// Aborts every worker, dropping in-flight tasks
    ///
    /// Also effective while [`WorkerPool::join`] is pending.
    pub fn abort(&self) {
        let aborts = self.aborts.lock().unwrap_or_else(|e| e.into_inner());
        for worker in aborts.iter() {
            worker.abort();
        }
        warn!(parent: &self.span, workers = aborts.len(), "Workers aborted");
    }
}

async fn worker_loop(
    rx: async_channel::Receiver<Task>,
    outstanding: Arc<Outstanding>,
    locks: PathLocks,
    handler: Arc<dyn TaskHandler>,
) {
    while let Ok(task) = rx.recv().await {
        let _completion = Completion(outstanding.clone());
        let _guards = locks.lock_all(&task.touched_paths()).await;

        match handler.handle(&task).await {
            Ok(()) => debug!(task = %task, "Task completed"),
            Err(e) => warn!(task = %task, error = %e, "Task failed, dropping"),
        }
    }
    debug!("Worker exiting");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use remsync_core::domain::RelativePath;

    use super::*;

    struct Noop;

    #[async_trait::async_trait]
    impl TaskHandler for Noop {
        async fn handle(&self, _task: &Task) -> Result<(), SyncError> {
            Ok(())
        }
    }

    struct AlwaysFails;

    #[async_trait::async_trait]
    impl TaskHandler for AlwaysFails {
        async fn handle(&self, task: &Task) -> Result<(), SyncError> {
            Err(SyncError::Watch(format!("boom {task}")))
        }
    }

    struct Hangs;

    #[async_trait::async_trait]
    impl TaskHandler for Hangs {
        async fn handle(&self, _task: &Task) -> Result<(), SyncError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    /// Records the peak number of concurrent operations on any one path
    #[derive(Default)]
    struct InFlight {
        current: std::sync::Mutex<std::collections::HashMap<RelativePath, usize>>,
        peak: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TaskHandler for InFlight {
        async fn handle(&self, task: &Task) -> Result<(), SyncError> {
            {
                let mut current = self.current.lock().unwrap();
                for path in task.touched_paths() {
                    let n = current.entry(path.clone()).or_default();
                    *n += 1;
                    self.peak
                        .fetch_max(*n, std::sync::atomic::Ordering::SeqCst);
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
            let mut current = self.current.lock().unwrap();
            for path in task.touched_paths() {
                if let Some(n) = current.get_mut(path) {
                    *n -= 1;
                }
            }
            Ok(())
        }
    }

    fn rel(s: &str) -> RelativePath {
        RelativePath::new(s).unwrap()
    }

    fn task(n: usize) -> Task {
        Task::write(RelativePath::new(&format!("f{n}")).unwrap())
    }

    #[tokio::test]
    async fn test_wait_without_tasks_returns_immediately() {
        let pool = WorkerPool::new(4, Span::none());
        tokio::time::timeout(Duration::from_millis(100), pool.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_drain_after_many_tasks() {
        let pool = WorkerPool::new(8, Span::none());
        pool.spawn_workers(3, Arc::new(Noop));
        for n in 0..100 {
            pool.submit(task(n)).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), pool.wait())
            .await
            .unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_workers() {
        let pool = WorkerPool::new(2, Span::none());
        pool.spawn_workers(1, Arc::new(AlwaysFails));
        for n in 0..10 {
            pool.submit(task(n)).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), pool.wait())
            .await
            .unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_path_never_runs_concurrently() {
        let handler = Arc::new(InFlight::default());
        let pool = WorkerPool::new(64, Span::none());
        pool.spawn_workers(4, handler.clone());
        for n in 0..40 {
            let t = if n % 2 == 0 {
                Task::write(rel("same.txt"))
            } else {
                Task::remove(rel("same.txt"))
            };
            pool.submit(t).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(10), pool.wait())
            .await
            .unwrap();
        assert_eq!(handler.peak.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rename_locks_both_paths() {
        let handler = Arc::new(InFlight::default());
        let pool = WorkerPool::new(64, Span::none());
        pool.spawn_workers(4, handler.clone());
        for n in 0..30 {
            let t = match n % 3 {
                0 => Task::rename(rel("a.txt"), rel("b.txt")),
                1 => Task::write(rel("a.txt")),
                _ => Task::rename(rel("b.txt"), rel("a.txt")),
            };
            pool.submit(t).await.unwrap();
        }
        tokio::time::timeout(Duration::from_secs(10), pool.wait())
            .await
            .unwrap();
        assert_eq!(handler.peak.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_submit_after_close_fails() {
        let pool = WorkerPool::new(2, Span::none());
        pool.close();
        assert!(matches!(pool.submit(task(0)).await, Err(SyncError::PoolClosed)));
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_close_drains_then_join() {
        let pool = WorkerPool::new(16, Span::none());
        for n in 0..10 {
            pool.submit(task(n)).await.unwrap();
        }
        pool.spawn_workers(2, Arc::new(Noop));
        pool.close();
        tokio::time::timeout(Duration::from_secs(5), pool.join())
            .await
            .unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_abort_after_join_timeout() {
        let pool = WorkerPool::new(4, Span::none());
        pool.spawn_workers(1, Arc::new(Hangs));
        pool.submit(task(0)).await.unwrap();
        pool.close();

        assert!(tokio::time::timeout(Duration::from_millis(50), pool.join())
            .await
            .is_err());
        pool.abort();

        // the aborted worker drops its completion guard
        tokio::time::timeout(Duration::from_secs(5), pool.wait())
            .await
            .unwrap();
    }
}
