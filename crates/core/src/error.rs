// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error types for the watch data model.

use thiserror::Error;

/// Errors constructing or validating a [`crate::WatchDescriptor`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("znode path must be non-empty")]
    EmptyPath,

    #[error("notify_signal must be in 1..=31, got {0}")]
    NotifySignalOutOfRange(i64),

    #[error("pipe_stdin is not meaningful for watch_type = children")]
    PipeStdinOnChildrenWatch,

    #[error("action must have at least one argv element")]
    EmptyAction,
}

/// Errors resolving a textual `uid`/`gid` into a numeric identity.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum IdentityError {
    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("unknown group: {0}")]
    UnknownGroup(String),
}
