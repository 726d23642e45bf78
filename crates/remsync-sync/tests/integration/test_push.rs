use std::time::Duration;

use remsync_core::domain::SyncDirection;

use crate::common::{config, dir_remote, eventually, read, session, write, Sides};

#[tokio::test]
async fn test_one_shot_push_into_empty_remote() {
    let sides = Sides::new();
    write(sides.local.path(), "a.txt", "X");
    write(sides.local.path(), "sub/b.txt", "Y");

    let s = session(
        config(SyncDirection::LocalToRemote, sides.local.path()),
        dir_remote(&sides),
    );
    let report = s.run_once().await.unwrap();

    assert_eq!(report.files_scheduled, 2);
    assert_eq!(read(sides.remote.path(), "a.txt").as_deref(), Some("X"));
    assert_eq!(read(sides.remote.path(), "sub/b.txt").as_deref(), Some("Y"));
    assert_eq!(s.outstanding(), 0);
}

#[tokio::test]
async fn test_second_session_transfers_nothing() {
    let sides = Sides::new();
    write(sides.local.path(), "a.txt", "X");
    write(sides.local.path(), "deep/er/c.txt", "C");

    let first = session(
        config(SyncDirection::LocalToRemote, sides.local.path()),
        dir_remote(&sides),
    );
    assert_eq!(first.run_once().await.unwrap().files_scheduled, 2);

    let second = session(
        config(SyncDirection::LocalToRemote, sides.local.path()),
        dir_remote(&sides),
    );
    let report = second.run_once().await.unwrap();
    assert_eq!(report.files_scheduled, 0);
    assert_eq!(report.directories_created, 0);
    assert_eq!(report.files_present, 2);
}

#[tokio::test]
async fn test_ignored_files_stay_local() {
    let sides = Sides::new();
    write(sides.local.path(), "notes.txt", "keep");
    write(sides.local.path(), ".notes.txt.swp", "scratch");

    let s = session(
        config(SyncDirection::LocalToRemote, sides.local.path()),
        dir_remote(&sides),
    );
    let report = s.run_once().await.unwrap();

    assert_eq!(report.ignored, 1);
    assert!(sides.remote.path().join("notes.txt").exists());
    assert!(!sides.remote.path().join(".notes.txt.swp").exists());
}

#[tokio::test]
async fn test_remote_root_below_base() {
    let sides = Sides::new();
    write(sides.local.path(), "a.txt", "X");

    let mut cfg = config(SyncDirection::LocalToRemote, sides.local.path());
    cfg.remote_root = remsync_core::domain::RemotePath::new("/backups/host").unwrap();
    let s = session(cfg, dir_remote(&sides));
    s.run_once().await.unwrap();

    assert_eq!(read(sides.remote.path(), "backups/host/a.txt").as_deref(), Some("X"));
}

#[tokio::test]
async fn test_live_create_and_remove_propagate() {
    let sides = Sides::new();
    let local = sides.local_root();
    let remote = sides.remote_root();

    let s = session(config(SyncDirection::LocalToRemote, &local), dir_remote(&sides));
    s.start().await.unwrap();

    write(&local, "c.txt", "Z");
    assert!(
        eventually(Duration::from_secs(10), || {
            read(&remote, "c.txt").as_deref() == Some("Z")
        })
        .await
    );

    std::fs::remove_file(local.join("c.txt")).unwrap();
    assert!(eventually(Duration::from_secs(10), || !remote.join("c.txt").exists()).await);

    s.stop().await.unwrap();
}

#[tokio::test]
async fn test_live_new_directory_is_watched() {
    let sides = Sides::new();
    let local = sides.local_root();
    let remote = sides.remote_root();

    let s = session(config(SyncDirection::LocalToRemote, &local), dir_remote(&sides));
    s.start().await.unwrap();

    std::fs::create_dir(local.join("fresh")).unwrap();
    assert!(eventually(Duration::from_secs(10), || remote.join("fresh").is_dir()).await);

    // the new directory is watched, so files created later still arrive
    write(&local, "fresh/later.txt", "L");
    assert!(
        eventually(Duration::from_secs(10), || {
            read(&remote, "fresh/later.txt").as_deref() == Some("L")
        })
        .await
    );

    std::fs::remove_dir_all(local.join("fresh")).unwrap();
    assert!(eventually(Duration::from_secs(10), || !remote.join("fresh").exists()).await);

    s.stop().await.unwrap();
}

#[tokio::test]
async fn test_live_rename_moves_remote_file() {
    let sides = Sides::new();
    let local = sides.local_root();
    let remote = sides.remote_root();
    write(&local, "old.txt", "R");

    let s = session(config(SyncDirection::LocalToRemote, &local), dir_remote(&sides));
    s.start().await.unwrap();
    s.wait_idle().await;
    assert_eq!(read(&remote, "old.txt").as_deref(), Some("R"));

    std::fs::rename(local.join("old.txt"), local.join("new.txt")).unwrap();
    assert!(
        eventually(Duration::from_secs(10), || {
            read(&remote, "new.txt").as_deref() == Some("R") && !remote.join("old.txt").exists()
        })
        .await
    );

    s.stop().await.unwrap();
}
