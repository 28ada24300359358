// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbxd`: the serving process for the project sandbox lifecycle core.
//!
//! Resolves configuration from the environment, wires the adapters and
//! engine layers together, runs Startup Sync once before accepting any
//! lifecycle request, then drives the Health Monitor's and Orphan
//! Cleaner's background loops until a shutdown signal arrives.

use std::process::ExitCode;
use std::sync::Arc;

use sbx_daemon::{Config, Service};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    sbx_daemon::logging::init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        port_range_start = config.port_range_start,
        port_range_width = config.port_range_width,
        container_runtime_backend = %config.container_runtime_backend,
        max_concurrent_sandboxes = config.max_concurrent_sandboxes,
        "starting sbxd"
    );

    let service = match Service::build(&config) {
        Ok(service) => Arc::new(service),
        Err(err) => {
            error!(error = %err, "failed to build service");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = service.startup_sync().await {
        error!(error = %err, "startup sync failed, refusing to serve");
        return ExitCode::FAILURE;
    }

    let shutdown = CancellationToken::new();
    let run_handle = tokio::spawn(service.clone().run(shutdown.clone()));

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown signal handler");
    }
    info!("shutdown signal received, stopping background loops");
    shutdown.cancel();

    if let Err(err) = run_handle.await {
        error!(error = %err, "background loop task panicked");
        return ExitCode::FAILURE;
    }

    info!("sbxd stopped");
    ExitCode::SUCCESS
}
