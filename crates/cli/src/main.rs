// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `twitcher` — one binary, one mode: watch a config directory of `.twc`
//! files and run actions in response to znode changes, translated from
//! `twitcher.py`'s `main()`.

mod args;
mod logging;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use twitcher_config::ConfigSource;
use twitcher_engine::Runtime;
use twitcher_zk::{RealZkAdapter, WatchMultiplexer};

use crate::args::Args;

const SESSION_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_level, args.log_format);

    if let Err(err) = run(args).await {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let servers = args.zkservers();
    info!(servers = ?servers, config_path = %args.config_path.display(), "starting twitcher");

    // Validate the config directory before dialing zookeeper: a bad
    // --config-path is a cheap, local mistake and should fail fast rather
    // than wait on a network timeout first.
    let config = ConfigSource::new(&args.config_path)
        .with_context(|| format!("unable to read config directory {}", args.config_path.display()))?;

    let (adapter, events) = RealZkAdapter::connect(&servers, SESSION_TIMEOUT)
        .await
        .map_err(|err| anyhow!("failed to connect to zookeeper: {err}"))?;
    let wm = Arc::new(WatchMultiplexer::new(Arc::new(adapter), events));

    let runtime = Runtime::new(wm, config);
    runtime.run().await.map_err(|err| anyhow!("event loop failed: {err}"))?;

    info!("twitcher stopped");
    Ok(())
}
