// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config Source (CS): walks a directory tree for `.twc` files and keeps
//! them loaded, reloading a file when its mtime changes and dropping it
//! when it disappears. Translated from `inotify.py`'s `InotifyWatcher`
//! and `config.py`'s `ConfigFile`.
//!
//! Directory change notification uses the `notify` crate instead of the
//! source's `fcntl(F_NOTIFY)` + `SIGIO`/`SIGHUP` signal pair: the signal
//! handler existed only to re-run `rescan()`, which is exactly what a
//! `notify` event channel drives directly, without a signal-safety
//! footgun in the handler.

use crate::error::ConfigError;
use crate::twc;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{info, warn};
use twitcher_core::WatchDescriptor;

const CONFIG_SUFFIX: &str = ".twc";

struct FileState {
    mtime: SystemTime,
    descriptors: Vec<WatchDescriptor>,
}

/// Watches a directory tree for `.twc` files and keeps a reloaded,
/// per-file descriptor set. Not internally locked: intended to be owned
/// and driven by a single task (the event loop).
pub struct ConfigSource {
    root: PathBuf,
    files: HashMap<PathBuf, FileState>,
    _watcher: RecommendedWatcher,
    changes: mpsc::UnboundedReceiver<()>,
}

impl ConfigSource {
    /// Performs the initial scan and starts watching `root` recursively.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = tx.send(());
            }
        })
        .map_err(|source| ConfigError::Watch { path: root.clone(), source })?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| ConfigError::Watch { path: root.clone(), source })?;

        let mut source = ConfigSource { root, files: HashMap::new(), _watcher: watcher, changes: rx };
        source.rescan();
        Ok(source)
    }

    /// Suspends until the watched tree changes. Returns `false` once the
    /// underlying watcher has shut down (the channel closed), at which
    /// point the caller should stop polling this source.
    pub async fn next_change(&mut self) -> bool {
        self.changes.recv().await.is_some()
    }

    /// Re-walks the tree, loading new/changed `.twc` files and dropping
    /// ones that disappeared. Per-file parse failures are logged and leave
    /// that file's previous descriptor set (if any) installed; they never
    /// abort the scan of the rest of the tree.
    pub fn rescan(&mut self) {
        let found = walk(&self.root);

        self.files.retain(|path, _| {
            let still_present = found.contains(path);
            if !still_present {
                info!(path = %path.display(), "config file removed");
            }
            still_present
        });

        for path in found {
            let mtime = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) => mtime,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unable to stat config file");
                    continue;
                }
            };
            if let Some(existing) = self.files.get(&path) {
                if existing.mtime == mtime {
                    continue;
                }
            }
            match load_file(&path) {
                Ok(descriptors) => {
                    info!(path = %path.display(), count = descriptors.len(), "loaded config file");
                    self.files.insert(path, FileState { mtime, descriptors });
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "keeping previous config for this file");
                }
            }
        }
    }

    /// All descriptors currently loaded, across every file.
    pub fn descriptors(&self) -> impl Iterator<Item = &WatchDescriptor> {
        self.files.values().flat_map(|f| f.descriptors.iter())
    }
}

fn load_file(path: &Path) -> Result<Vec<WatchDescriptor>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let prefix = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    twc::parse(&contents, &prefix).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

/// Recurses through `root`, skipping dot-directories, returning every
/// `.twc` file found.
fn walk(root: &Path) -> std::collections::HashSet<PathBuf> {
    let mut found = std::collections::HashSet::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "unable to access directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_dot = path.file_name().map(|n| n.to_string_lossy().starts_with('.')).unwrap_or(false);
            if path.is_dir() {
                if !is_dot {
                    stack.push(path);
                }
            } else if path.is_file() && path.to_string_lossy().ends_with(CONFIG_SUFFIX) {
                found.insert(path);
            }
        }
    }
    found
}

#[cfg(test)]
#[path = "source_tests.rs"]
mod tests;
