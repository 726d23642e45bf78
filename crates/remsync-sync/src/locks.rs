//! Per-path serialization
//!
//! [`PathLocks`] hands out one async mutex per [`RelativePath`]. Entries are
//! dropped from the map once no guard or waiter references them, so the map
//! only holds paths with work in flight.

use std::sync::Arc;

use dashmap::DashMap;
use remsync_core::domain::RelativePath;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    inner: Arc<DashMap<RelativePath, Arc<Mutex<()>>>>,
}

/// Holds a path locked until dropped
#[derive(Debug)]
pub struct PathGuard {
    locks: PathLocks,
    path: RelativePath,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, path: &RelativePath) -> PathGuard {
        let mutex = self.inner.entry(path.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        PathGuard {
            locks: self.clone(),
            path: path.clone(),
            guard: Some(guard),
        }
    }

    /// Locks several paths in sorted order
    pub async fn lock_all(&self, paths: &[&RelativePath]) -> Vec<PathGuard> {
        let mut sorted: Vec<&RelativePath> = paths.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for path in sorted {
            guards.push(self.lock(path).await);
        }
        guards
    }

    /// Number of paths currently locked or waited on
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for PathGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .inner
            .remove_if(&self.path, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn rel(s: &str) -> RelativePath {
        RelativePath::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_same_path_is_exclusive() {
        let locks = PathLocks::new();
        let guard = locks.lock(&rel("a")).await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = contender.lock(&rel("a")).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_paths_do_not_block() {
        let locks = PathLocks::new();
        let _a = locks.lock(&rel("a")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&rel("b"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_entries_removed_when_released() {
        let locks = PathLocks::new();
        {
            let _g = locks.lock_all(&[&rel("z"), &rel("a"), &rel("z")]).await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }
}
