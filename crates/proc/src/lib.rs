// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! twitcher-proc: runs one action as a supervised child process.
//!
//! Owns everything between "we decided to run this action" and "the child
//! exited": identity resolution, descriptor-table hygiene, stdin piping,
//! and signal delivery. Knows nothing about ZooKeeper or watch state.

pub mod identity;
pub mod runner;

pub use runner::{PollResult, SpawnError, Subprocess};
