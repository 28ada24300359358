// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport/runtime-level error type for the adapters crate.
//!
//! Port implementations return [`AdapterError`]; callers at the lifecycle
//! boundary map it onto [`sbx_core::SandboxError`] (§7's Rust realization).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("container runtime error: {0}")]
    Runtime(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("lock acquisition failed: {0}")]
    LockFailed(String),

    #[error("control channel error: {0}")]
    ControlChannel(String),
}

impl From<bollard::errors::Error> for AdapterError {
    fn from(err: bollard::errors::Error) -> Self {
        AdapterError::Runtime(err.to_string())
    }
}

impl From<AdapterError> for sbx_core::SandboxError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::NotFound(msg) => {
                sbx_core::SandboxError::ContainerRuntimeError(format!("not found: {msg}"))
            }
            AdapterError::Runtime(msg) => sbx_core::SandboxError::ContainerRuntimeError(msg),
            AdapterError::Io(err) => sbx_core::SandboxError::ContainerRuntimeError(err.to_string()),
            AdapterError::Timeout(d) => sbx_core::SandboxError::Timeout(d),
            AdapterError::LockFailed(msg) => sbx_core::SandboxError::Conflict(msg),
            AdapterError::ControlChannel(msg) => sbx_core::SandboxError::ControlChannelError(msg),
        }
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;
