// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain error type shared by every lifecycle component.

use thiserror::Error;

use crate::ids::ProjectId;

/// Errors the sandbox lifecycle core can surface to a caller.
///
/// Background loops (Health Monitor, Orphan Cleaner, TTL sweep) never let
/// these escape a tick: they log at [`tracing::warn!`]/[`tracing::error!`]
/// and continue. Only `Lifecycle Service` operations propagate a `SandboxError`
/// to their caller, and even then only the subset documented on each method.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("no association found for project {0:?}")]
    NotFound(ProjectId),

    #[error("sandbox {0} not found")]
    SandboxNotFound(crate::ids::SandboxId),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("requested resource configuration rejected: {0}")]
    ResourceRejected(String),

    #[error("container runtime error: {0}")]
    ContainerRuntimeError(String),

    #[error("control channel error: {0}")]
    ControlChannelError(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("security policy violation: {0}")]
    SecurityError(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl SandboxError {
    /// Process exit code for the health-level CLI surface (§6).
    ///
    /// `0` success is implicit (no error); callers map `Ok` to `0` themselves.
    pub fn exit_code(&self) -> i32 {
        match self {
            SandboxError::NotFound(_) | SandboxError::SandboxNotFound(_) => 2,
            SandboxError::ResourceExhausted(_) | SandboxError::ResourceRejected(_) => 3,
            _ => 1,
        }
    }
}

pub type SandboxResult<T> = Result<T, SandboxError>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
