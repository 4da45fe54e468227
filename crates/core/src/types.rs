// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model: the typed surface that a Config Source (or an embedder
//! linking this crate directly) constructs to describe one watch.

use crate::error::DescriptorError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The two flavors of znode watch exposed by the coordination service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchType {
    Data,
    Children,
}

impl Default for WatchType {
    fn default() -> Self {
        WatchType::Data
    }
}

/// Execution policy for notifications arriving while a prior action of the
/// same [`crate::WatchDescriptor`] is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Queue one deferred run, coalescing any number of notifications
    /// received while the current run is in flight.
    Queue,
    /// Run again immediately regardless of what is already running.
    Parallel,
    /// Drop notifications received while a run is in flight; re-arm the
    /// watch once it completes.
    Discard,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Queue
    }
}

/// Either a numeric id or a name to be resolved at spawn time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Identity {
    Numeric(u32),
    Name(String),
}

/// A signal number advisory-delivered to a running child on a QUEUE-mode
/// notification. Valid range is 1..=31 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifySignal(u8);

impl NotifySignal {
    pub fn new(value: i64) -> Result<Self, DescriptorError> {
        if (1..32).contains(&value) {
            Ok(NotifySignal(value as u8))
        } else {
            Err(DescriptorError::NotifySignalOutOfRange(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// The action to run post-fork. `Fn` exists for embedders linking this crate
/// as a library rather than going through the `.twc` front-end; the `.twc`
/// front-end only ever produces `Exec`/`Shell`.
#[derive(Clone)]
pub enum Action {
    /// `argv`-style: executed directly, no shell involved.
    Exec(Vec<String>),
    /// A string executed as `/bin/sh -c <command>`.
    Shell(String),
    /// A native closure, run in the child after fork/dup2/privilege-drop.
    /// Returning `Ok(code)` exits with `code`; `Err` exits 1.
    Fn(Arc<dyn Fn() -> Result<i32, String> + Send + Sync>),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Exec(argv) => f.debug_tuple("Exec").field(argv).finish(),
            Action::Shell(cmd) => f.debug_tuple("Shell").field(cmd).finish(),
            Action::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

impl PartialEq for Action {
    /// `Fn` closures compare by pointer identity, since there is no way to
    /// compare two trait objects by value; everything reconciling a
    /// descriptor set cares about is whether the *same* closure is still
    /// installed, not whether two closures happen to behave the same.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Action::Exec(a), Action::Exec(b)) => a == b,
            (Action::Shell(a), Action::Shell(b)) => a == b,
            (Action::Fn(a), Action::Fn(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Action {
    /// Convenience constructor mirroring the source's `twitcher.Exec(command)`:
    /// a string is shell-wrapped, a list is exec'd directly.
    pub fn shell(command: impl Into<String>) -> Self {
        Action::Shell(command.into())
    }

    pub fn exec(argv: Vec<String>) -> Self {
        Action::Exec(argv)
    }
}

/// One `(znode, action, policy)` tuple, produced by a Config Source (or
/// constructed directly by an embedder) and owned by exactly one
/// `WatchObject` for its lifetime. `PartialEq` compares every field by
/// value and is used by the engine to tell an unchanged descriptor apart
/// from one that needs its `WatchObject` torn down and respawned.
#[derive(Clone, Debug, PartialEq)]
pub struct WatchDescriptor {
    pub path: String,
    pub action: Action,
    pub pipe_stdin: bool,
    pub run_on_load: bool,
    pub run_mode: RunMode,
    pub watch_type: WatchType,
    pub uid: Option<Identity>,
    pub gid: Option<Identity>,
    pub notify_signal: Option<NotifySignal>,
    pub timeout: Option<Duration>,
    pub description: String,
}

impl WatchDescriptor {
    /// Validates invariants that are cheap to check once, at construction
    /// time, rather than repeatedly at every notification.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.path.is_empty() {
            return Err(DescriptorError::EmptyPath);
        }
        if let Action::Exec(argv) = &self.action {
            if argv.is_empty() {
                return Err(DescriptorError::EmptyAction);
            }
        }
        if self.watch_type == WatchType::Children && self.pipe_stdin {
            return Err(DescriptorError::PipeStdinOnChildrenWatch);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
