// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

fn write(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

#[test]
fn loads_watches_from_twc_files_in_subdirectories() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    write(&dir.path().join("a.twc"), "[[watch]]\nznode = \"/a\"\naction = \"echo a\"\n");
    write(&dir.path().join("sub/b.twc"), "[[watch]]\nznode = \"/b\"\naction = \"echo b\"\n");

    let source = ConfigSource::new(dir.path()).unwrap();
    let paths: Vec<_> = source.descriptors().map(|d| d.path.clone()).collect();
    assert_eq!(paths.len(), 2);
    assert!(paths.contains(&"/a".to_string()));
    assert!(paths.contains(&"/b".to_string()));
}

#[test]
fn ignores_dot_directories_and_non_twc_files() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    write(&dir.path().join(".git/ignored.twc"), "[[watch]]\nznode = \"/ignored\"\naction = \"echo x\"\n");
    write(&dir.path().join("notes.txt"), "not a config file");

    let source = ConfigSource::new(dir.path()).unwrap();
    assert_eq!(source.descriptors().count(), 0);
}

#[test]
fn a_malformed_file_does_not_prevent_other_files_from_loading() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("good.twc"), "[[watch]]\nznode = \"/good\"\naction = \"echo ok\"\n");
    write(&dir.path().join("bad.twc"), "this is not valid toml {{{");

    let source = ConfigSource::new(dir.path()).unwrap();
    let paths: Vec<_> = source.descriptors().map(|d| d.path.clone()).collect();
    assert_eq!(paths, vec!["/good".to_string()]);
}

#[test]
fn reload_keeps_prior_descriptors_when_a_file_is_edited_to_be_invalid() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("a.twc");
    write(&file, "[[watch]]\nznode = \"/a\"\naction = \"echo a\"\n");

    let mut source = ConfigSource::new(dir.path()).unwrap();
    assert_eq!(source.descriptors().count(), 1);

    std::thread::sleep(Duration::from_millis(10));
    write(&file, "not valid toml {{{");
    source.rescan();

    assert_eq!(source.descriptors().count(), 1);
    assert_eq!(source.descriptors().next().unwrap().path, "/a");
}

#[test]
fn removing_a_file_drops_its_descriptors_on_rescan() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("a.twc");
    write(&file, "[[watch]]\nznode = \"/a\"\naction = \"echo a\"\n");

    let mut source = ConfigSource::new(dir.path()).unwrap();
    assert_eq!(source.descriptors().count(), 1);

    fs::remove_file(&file).unwrap();
    source.rescan();
    assert_eq!(source.descriptors().count(), 0);
}

#[test]
fn unchanged_mtime_skips_a_reparse() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("a.twc");
    write(&file, "[[watch]]\nznode = \"/a\"\naction = \"echo a\"\n");

    let mut source = ConfigSource::new(dir.path()).unwrap();
    source.rescan();
    source.rescan();
    assert_eq!(source.descriptors().count(), 1);
}
