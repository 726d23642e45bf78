use std::time::Duration;

use remsync_core::domain::SyncDirection;

use crate::common::{config, dir_remote, eventually, read, session, write, Sides};

#[tokio::test]
async fn test_one_shot_pull_creates_local_root() {
    let sides = Sides::new();
    write(sides.remote.path(), "a.txt", "X");
    write(sides.remote.path(), "sub/b.txt", "Y");
    let local = sides.local.path().join("not/yet/there");

    let s = session(config(SyncDirection::RemoteToLocal, &local), dir_remote(&sides));
    let report = s.run_once().await.unwrap();

    assert_eq!(report.files_scheduled, 2);
    assert_eq!(read(&local, "a.txt").as_deref(), Some("X"));
    assert_eq!(read(&local, "sub/b.txt").as_deref(), Some("Y"));
}

#[tokio::test]
async fn test_live_pull_follows_remote_changes() {
    let sides = Sides::new();
    let local = sides.local_root();
    let remote = sides.remote_root();
    write(&remote, "seed.txt", "S");

    let s = session(config(SyncDirection::RemoteToLocal, &local), dir_remote(&sides));
    s.start().await.unwrap();
    s.wait_idle().await;
    assert_eq!(read(&local, "seed.txt").as_deref(), Some("S"));
    // let the first poll cycle seed its snapshot
    tokio::time::sleep(Duration::from_millis(250)).await;

    write(&remote, "nested/new.txt", "N");
    assert!(
        eventually(Duration::from_secs(10), || {
            read(&local, "nested/new.txt").as_deref() == Some("N")
        })
        .await
    );

    std::fs::remove_file(remote.join("seed.txt")).unwrap();
    assert!(eventually(Duration::from_secs(10), || !local.join("seed.txt").exists()).await);

    s.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_is_prompt_with_long_poll_interval() {
    let sides = Sides::new();
    let local = sides.local_root();
    let cfg = config(SyncDirection::RemoteToLocal, &local)
        .with_poll_interval(Duration::from_secs(3600));

    let s = session(cfg, dir_remote(&sides));
    s.start().await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), s.stop())
        .await
        .unwrap()
        .unwrap();
}
