// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle event payload emitted through the Event Publisher port (§6).
//!
//! The publisher itself is an external collaborator (§1); this module only
//! defines the wire shape the core hands it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ProjectId, SandboxId, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventType {
    SandboxCreated,
    SandboxTerminated,
    SandboxStatus,
    DesktopStarted,
    DesktopStopped,
    DesktopStatus,
    TerminalStarted,
    TerminalStopped,
    TerminalStatus,
}

crate::simple_display! {
    LifecycleEventType {
        SandboxCreated => "sandbox_created",
        SandboxTerminated => "sandbox_terminated",
        SandboxStatus => "sandbox_status",
        DesktopStarted => "desktop_started",
        DesktopStopped => "desktop_stopped",
        DesktopStatus => "desktop_status",
        TerminalStarted => "terminal_started",
        TerminalStopped => "terminal_stopped",
        TerminalStatus => "terminal_status",
    }
}

/// Routed per-project to a stream named `sandbox:events:{project_id}` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    #[serde(rename = "type")]
    pub event_type: LifecycleEventType,
    pub sandbox_id: SandboxId,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl LifecycleEvent {
    pub fn stream_name(project_id: &ProjectId) -> String {
        format!("sandbox:events:{project_id}")
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
