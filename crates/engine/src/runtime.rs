// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event Loop (EL): owns the config source and the live set of watch
//! objects, translated from `twitcher.py`'s `Twitcher.run()`.
//!
//! The source used a self-pipe (`os.pipe()` plumbed through
//! `signal.set_wakeup_fd`) so a `SIGCHLD` handler could wake a blocking
//! `select.select()` loop. That plumbing doesn't exist here: `tokio::select!`
//! already multiplexes the config-change channel and the OS signal streams
//! as ordinary futures, and each `WatchObject` reaps its own children on
//! its own task instead of a central loop polling every descriptor's fds.
//! This is a deliberate architectural substitution, not a dropped feature.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use twitcher_config::ConfigSource;
use twitcher_core::WatchDescriptor;
use twitcher_zk::{WatchMultiplexer, ZkAdapter};

use crate::watch_object::WatchObject;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

struct RunningWatch {
    descriptor: WatchDescriptor,
    handle: JoinHandle<()>,
}

pub struct Runtime<A: ZkAdapter + 'static> {
    wm: Arc<WatchMultiplexer<A>>,
    config: ConfigSource,
    watches: HashMap<String, RunningWatch>,
    shutdown: CancellationToken,
}

impl<A: ZkAdapter + 'static> Runtime<A> {
    pub fn new(wm: Arc<WatchMultiplexer<A>>, config: ConfigSource) -> Self {
        Self { wm, config, watches: HashMap::new(), shutdown: CancellationToken::new() }
    }

    /// Runs until a termination signal arrives or the config source shuts
    /// down. Reconciles the live watch set against the config on every
    /// change: a descriptor keyed by its `description` (unique per file
    /// position) keeps its `WatchObject` running untouched across a
    /// reload if its value is unchanged, so editing one `.twc` file never
    /// disturbs every other watch in the directory (see DESIGN.md).
    pub async fn run(mut self) -> Result<(), EngineError> {
        let mut sighup = signal(SignalKind::hangup()).map_err(EngineError::Signal)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(EngineError::Signal)?;

        self.reconcile();

        loop {
            tokio::select! {
                changed = self.config.next_change() => {
                    if !changed {
                        info!("config source shut down; exiting");
                        break;
                    }
                    info!("config directory changed; rescanning");
                    self.config.rescan();
                    self.reconcile();
                }
                _ = sighup.recv() => {
                    info!("SIGHUP received; rescanning config");
                    self.config.rescan();
                    self.reconcile();
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received; shutting down");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("SIGINT received; shutting down");
                    break;
                }
            }
        }

        self.graceful_shutdown().await;
        Ok(())
    }

    /// Diffs the config source's current descriptor set against the live
    /// watch set, keyed by each descriptor's `description`. A descriptor
    /// that is new or whose value changed gets its (old, if any)
    /// `WatchObject` aborted and a fresh one spawned; a descriptor whose
    /// value is byte-for-byte unchanged is left running untouched, so its
    /// `run_on_load` first-notification bookkeeping and any child it has
    /// in flight are not disturbed by an edit to an unrelated file.
    /// Descriptors no longer present in the config are torn down.
    fn reconcile(&mut self) {
        let mut seen = std::collections::HashSet::new();

        for descriptor in self.config.descriptors() {
            if let Err(err) = descriptor.validate() {
                warn!(path = %descriptor.path, %err, "skipping invalid descriptor");
                continue;
            }
            seen.insert(descriptor.description.clone());

            if let Some(running) = self.watches.get(&descriptor.description) {
                if &running.descriptor == descriptor {
                    continue;
                }
            }

            if let Some(old) = self.watches.remove(&descriptor.description) {
                old.handle.abort();
            }
            let wo = WatchObject::new(descriptor.clone(), self.wm.clone());
            let handle = wo.spawn(self.shutdown.clone());
            self.watches.insert(descriptor.description.clone(), RunningWatch { descriptor: descriptor.clone(), handle });
        }

        let removed: Vec<String> = self.watches.keys().filter(|key| !seen.contains(*key)).cloned().collect();
        for key in removed {
            if let Some(old) = self.watches.remove(&key) {
                old.handle.abort();
            }
        }
    }

    /// Tears down the whole watch set outright, used for final test
    /// teardown. In-flight children are not waited on here; only the
    /// final process shutdown (`graceful_shutdown`) does that, since
    /// letting every reload drain would make config edits slow to take
    /// effect (see DESIGN.md).
    #[cfg(test)]
    fn abort_watches(&mut self) {
        for (_, running) in self.watches.drain() {
            running.handle.abort();
        }
    }

    /// Stops accepting new notifications on every live watch and waits for
    /// whatever child each one is currently running to finish and be
    /// reaped, then returns. This is the daemon's only graceful-shutdown
    /// behavior: no new rescans, no new registrations, but already-running
    /// work is allowed to complete.
    async fn graceful_shutdown(&mut self) {
        self.shutdown.cancel();
        for (_, running) in self.watches.drain() {
            if let Err(err) = running.handle.await {
                warn!(%err, "watch task panicked during shutdown");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn watch_count(&self) -> usize {
        self.watches.len()
    }

    #[cfg(test)]
    pub(crate) fn reconcile_for_test(&mut self) {
        self.reconcile();
    }

    #[cfg(test)]
    pub(crate) fn rescan_for_test(&mut self) {
        self.config.rescan();
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
