// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for the `.twc` TOML configuration front-end, translated from
//! `config.py`'s `_NamespaceConfig.RegisterWatch` into a static schema.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use twitcher_core::{Action, DescriptorError, Identity, NotifySignal, RunMode, WatchDescriptor, WatchType};

#[derive(Debug, Error)]
pub enum TwcError {
    #[error("failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("watch {index} ({znode:?}): {source}")]
    Descriptor { index: usize, znode: String, #[source] source: DescriptorError },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TwcFile {
    #[serde(rename = "watch", default)]
    watches: Vec<TwcWatch>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TwcAction {
    Shell(String),
    Argv(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TwcWatch {
    znode: String,
    description: Option<String>,
    action: TwcAction,
    #[serde(default = "default_true")]
    pipe_stdin: bool,
    #[serde(default = "default_true")]
    run_on_load: bool,
    #[serde(default)]
    run_mode: RunMode,
    #[serde(default)]
    watch_type: WatchType,
    uid: Option<Identity>,
    gid: Option<Identity>,
    notify_signal: Option<i64>,
    timeout: Option<u64>,
}

fn default_true() -> bool {
    true
}

/// Parses one `.twc` file's contents into its watch descriptors. Each
/// `[[watch]]` table becomes exactly one `WatchDescriptor`, numbered from
/// zero in the order they appear, used only for error messages.
pub fn parse(source: &str, default_description_prefix: &str) -> Result<Vec<WatchDescriptor>, TwcError> {
    let file: TwcFile = toml::from_str(source)?;
    file.watches
        .into_iter()
        .enumerate()
        .map(|(index, watch)| to_descriptor(index, watch, default_description_prefix))
        .collect()
}

fn to_descriptor(index: usize, watch: TwcWatch, default_description_prefix: &str) -> Result<WatchDescriptor, TwcError> {
    let znode = watch.znode.clone();
    let action = match watch.action {
        TwcAction::Shell(command) => Action::shell(command),
        TwcAction::Argv(argv) => Action::exec(argv),
    };
    let notify_signal = watch
        .notify_signal
        .map(NotifySignal::new)
        .transpose()
        .map_err(|source| TwcError::Descriptor { index, znode: znode.clone(), source })?;

    let descriptor = WatchDescriptor {
        path: watch.znode,
        action,
        pipe_stdin: watch.pipe_stdin,
        run_on_load: watch.run_on_load,
        run_mode: watch.run_mode,
        watch_type: watch.watch_type,
        uid: watch.uid,
        gid: watch.gid,
        notify_signal,
        timeout: watch.timeout.map(Duration::from_secs),
        description: watch
            .description
            .unwrap_or_else(|| format!("{default_description_prefix}-{}", index + 1)),
    };
    descriptor
        .validate()
        .map_err(|source| TwcError::Descriptor { index, znode, source })?;
    Ok(descriptor)
}

#[cfg(test)]
#[path = "twc_tests.rs"]
mod tests;
