// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! twitcher-config: the Config Source and its `.twc` front-end.
//!
//! Produces plain `twitcher_core::WatchDescriptor` values; the rest of the
//! workspace has no idea this crate, or TOML, exist.

pub mod error;
pub mod source;
pub mod twc;

pub use error::ConfigError;
pub use source::ConfigSource;
