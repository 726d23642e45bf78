use std::sync::Arc;

use remsync_core::domain::SyncDirection;

use crate::common::{config, read, session, write, FaultyRemote, Sides};

#[tokio::test]
async fn test_exhausted_retries_drop_only_that_task() {
    let sides = Sides::new();
    write(sides.local.path(), "good.txt", "G");
    write(sides.local.path(), "bad.txt", "B");
    write(sides.local.path(), "more/also-good.txt", "A");

    let remote = Arc::new(FaultyRemote::new(sides.remote_root(), "bad.txt"));
    let cfg = config(SyncDirection::LocalToRemote, sides.local.path())
        .with_workers(1)
        .with_max_retries(3);
    let s = session(cfg, remote.clone());

    let report = s.run_once().await.unwrap();

    assert_eq!(report.files_scheduled, 3);
    assert_eq!(remote.attempts(), 3);
    assert!(!sides.remote.path().join("bad.txt").exists());
    // the single worker kept going after the failed task
    assert_eq!(read(sides.remote.path(), "good.txt").as_deref(), Some("G"));
    assert_eq!(
        read(sides.remote.path(), "more/also-good.txt").as_deref(),
        Some("A")
    );
}

#[tokio::test]
async fn test_single_attempt_budget() {
    let sides = Sides::new();
    write(sides.local.path(), "bad.txt", "B");

    let remote = Arc::new(FaultyRemote::new(sides.remote_root(), "bad.txt"));
    let cfg = config(SyncDirection::LocalToRemote, sides.local.path()).with_max_retries(1);
    session(cfg, remote.clone()).run_once().await.unwrap();

    assert_eq!(remote.attempts(), 1);
}
