// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to connect to container runtime: {0}")]
    ContainerRuntimeConnect(String),

    #[error("startup sync failed: {0}")]
    StartupSync(#[from] sbx_core::SandboxError),
}
