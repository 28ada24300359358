// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured logging setup (§10 Ambient Engineering, "Logging").
//!
//! `RUST_LOG` controls verbosity per the usual `tracing_subscriber::EnvFilter`
//! syntax (e.g. `sbxd=debug,sbx_engine=debug`); with no `RUST_LOG` set this
//! defaults to `info` so a freshly started daemon is never silent.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
