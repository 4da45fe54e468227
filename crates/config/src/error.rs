// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::twc::TwcError;
use thiserror::Error;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config directory {path}: {source}")]
    Directory { path: PathBuf, #[source] source: std::io::Error },

    #[error("unable to read {path}: {source}")]
    ReadFile { path: PathBuf, #[source] source: std::io::Error },

    #[error("{path}: {source}")]
    Parse { path: PathBuf, #[source] source: TwcError },

    #[error("failed to start directory watch on {path}: {source}")]
    Watch { path: PathBuf, #[source] source: notify::Error },
}
