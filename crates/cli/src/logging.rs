// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Installs the process-wide `tracing` subscriber. Default output is
//! single-line human-readable text on stderr; `TWITCHER_LOG=json` or
//! `--log-format json` switches to newline-delimited JSON.

use tracing_subscriber::{fmt, EnvFilter};

use crate::args::LogFormat;

pub fn init(default_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_env("TWITCHER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let use_json = format == LogFormat::Json || std::env::var("TWITCHER_LOG").as_deref() == Ok("json");

    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if use_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
