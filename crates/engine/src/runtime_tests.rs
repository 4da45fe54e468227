// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;
use tempfile::tempdir;
use twitcher_zk::fake::fake_pair;

#[tokio::test]
async fn reconcile_spawns_one_watch_per_valid_descriptor() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.twc"), "[[watch]]\nznode = \"/a\"\naction = \"true\"\n").unwrap();
    fs::write(dir.path().join("b.twc"), "[[watch]]\nznode = \"/b\"\naction = \"true\"\n").unwrap();

    let (adapter, events) = fake_pair();
    adapter.set_data("/a", Vec::new());
    adapter.set_data("/b", Vec::new());
    let wm = Arc::new(WatchMultiplexer::new(adapter, events));
    let config = ConfigSource::new(dir.path()).unwrap();

    let mut runtime = Runtime::new(wm, config);
    runtime.reconcile_for_test();
    assert_eq!(runtime.watch_count(), 2);
    runtime.abort_watches();
}

#[tokio::test]
async fn reconcile_is_idempotent_on_an_unchanged_config() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.twc"), "[[watch]]\nznode = \"/a\"\naction = \"true\"\n").unwrap();

    let (adapter, events) = fake_pair();
    adapter.set_data("/a", Vec::new());
    let wm = Arc::new(WatchMultiplexer::new(adapter, events));
    let config = ConfigSource::new(dir.path()).unwrap();

    let mut runtime = Runtime::new(wm, config);
    runtime.reconcile_for_test();
    assert_eq!(runtime.watch_count(), 1);
    runtime.reconcile_for_test();
    assert_eq!(runtime.watch_count(), 1);
    runtime.abort_watches();
}

#[tokio::test]
async fn reconcile_leaves_an_unchanged_descriptor_running_when_a_sibling_file_changes() {
    let dir = tempdir().unwrap();
    let marker_a = tempfile::NamedTempFile::new().unwrap();
    let marker_a_path = marker_a.path().to_path_buf();
    let marker_b = tempfile::NamedTempFile::new().unwrap();
    let marker_b_path = marker_b.path().to_path_buf();

    fs::write(dir.path().join("a.twc"), format!("[[watch]]\nznode = \"/a\"\naction = \"echo run >> {}\"\n", marker_a_path.display())).unwrap();
    fs::write(dir.path().join("b.twc"), format!("[[watch]]\nznode = \"/b\"\naction = \"echo run >> {}\"\n", marker_b_path.display())).unwrap();

    let (adapter, events) = fake_pair();
    adapter.set_data("/a", Vec::new());
    adapter.set_data("/b", Vec::new());
    let wm = Arc::new(WatchMultiplexer::new(adapter, events));
    let config = ConfigSource::new(dir.path()).unwrap();

    let mut runtime = Runtime::new(wm, config);
    runtime.reconcile_for_test();
    assert_eq!(runtime.watch_count(), 2);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(fs::read_to_string(&marker_a_path).unwrap(), "run\n");
    assert_eq!(fs::read_to_string(&marker_b_path).unwrap(), "run\n");

    // Only b's descriptor changes; a's should keep running untouched and
    // must not re-fire its run_on_load action a second time.
    fs::write(dir.path().join("b.twc"), format!("[[watch]]\nznode = \"/b\"\naction = \"echo run2 >> {}\"\n", marker_b_path.display())).unwrap();
    runtime.rescan_for_test();
    runtime.reconcile_for_test();
    assert_eq!(runtime.watch_count(), 2);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    assert_eq!(fs::read_to_string(&marker_a_path).unwrap(), "run\n", "unrelated descriptor must not re-fire on a sibling's change");
    assert_eq!(fs::read_to_string(&marker_b_path).unwrap(), "run\nrun2\n", "changed descriptor should have been respawned and re-fired");
    runtime.abort_watches();
}

#[tokio::test]
async fn reconcile_tears_down_a_descriptor_removed_from_the_config() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.twc"), "[[watch]]\nznode = \"/a\"\naction = \"true\"\n").unwrap();
    fs::write(dir.path().join("b.twc"), "[[watch]]\nznode = \"/b\"\naction = \"true\"\n").unwrap();

    let (adapter, events) = fake_pair();
    adapter.set_data("/a", Vec::new());
    adapter.set_data("/b", Vec::new());
    let wm = Arc::new(WatchMultiplexer::new(adapter, events));
    let config = ConfigSource::new(dir.path()).unwrap();

    let mut runtime = Runtime::new(wm, config);
    runtime.reconcile_for_test();
    assert_eq!(runtime.watch_count(), 2);

    fs::remove_file(dir.path().join("b.twc")).unwrap();
    runtime.rescan_for_test();
    runtime.reconcile_for_test();
    assert_eq!(runtime.watch_count(), 1);
    runtime.abort_watches();
}

#[tokio::test]
async fn graceful_shutdown_lets_a_running_child_finish_then_clears_the_watch_set() {
    let dir = tempdir().unwrap();
    let marker = tempfile::NamedTempFile::new().unwrap();
    let marker_path = marker.path().to_path_buf();
    fs::write(
        dir.path().join("a.twc"),
        format!("[[watch]]\nznode = \"/a\"\naction = \"sleep 0.2 && echo run >> {}\"\n", marker_path.display()),
    )
    .unwrap();

    let (adapter, events) = fake_pair();
    adapter.set_data("/a", Vec::new());
    let wm = Arc::new(WatchMultiplexer::new(adapter, events));
    let config = ConfigSource::new(dir.path()).unwrap();

    let mut runtime = Runtime::new(wm, config);
    runtime.reconcile_for_test();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    runtime.graceful_shutdown().await;
    assert_eq!(runtime.watch_count(), 0);
    assert_eq!(std::fs::read_to_string(&marker_path).unwrap(), "run\n");
}
