use std::time::Duration;

use remsync_core::domain::SyncDirection;
use remsync_sync::{SessionState, SyncError};

use crate::common::{config, dir_remote, session, write, Sides};

#[tokio::test]
async fn test_run_once_leaves_session_stopped() {
    let sides = Sides::new();
    write(sides.local.path(), "a.txt", "X");
    let remote = dir_remote(&sides);

    let s = session(
        config(SyncDirection::LocalToRemote, sides.local.path()),
        remote.clone(),
    );
    s.run_once().await.unwrap();

    assert_eq!(s.state(), SessionState::Stopped);
    assert!(remote.is_closed());
    assert!(matches!(
        s.start().await,
        Err(SyncError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_stop_drains_scheduled_transfers() {
    let sides = Sides::new();
    for n in 0..50 {
        write(sides.local.path(), &format!("batch/f{n:02}.txt"), "payload");
    }

    let s = session(
        config(SyncDirection::LocalToRemote, sides.local.path()).with_workers(2),
        dir_remote(&sides),
    );
    let report = s.start().await.unwrap();
    assert_eq!(report.files_scheduled, 50);

    tokio::time::timeout(Duration::from_secs(10), s.stop())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(s.outstanding(), 0);
    let copied = std::fs::read_dir(sides.remote.path().join("batch"))
        .unwrap()
        .count();
    assert_eq!(copied, 50);
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let sides = Sides::new();
    let cfg = config(SyncDirection::LocalToRemote, sides.local.path()).with_workers(0);
    let result = remsync_sync::SyncSession::new(
        cfg,
        std::sync::Arc::new(remsync_sync::filesystem::LocalFileSystemAdapter::new()),
        dir_remote(&sides),
    );
    assert!(matches!(result, Err(SyncError::Domain(_))));
}
