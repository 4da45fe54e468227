// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Watches a directory of `.twc` files and runs actions in response to
/// ZooKeeper znode changes.
#[derive(Parser, Debug)]
#[command(name = "twitcher", version, about)]
pub struct Args {
    /// ZooKeeper servers, e.g. `zk1:2181,zk2:2181`
    #[arg(long)]
    pub zkservers: String,

    /// Directory to scan for `.twc` watch descriptor files
    #[arg(long)]
    pub config_path: PathBuf,

    /// Minimum log level (also settable via RUST_LOG/TWITCHER_LOG)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Args {
    /// Splits `--zkservers` on commas into individual `host[:port]` entries.
    pub fn zkservers(&self) -> Vec<String> {
        self.zkservers.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
