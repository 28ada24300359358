// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entities shared by every lifecycle component (§3 of the design).

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssociationId, ProjectId, SandboxId, TenantId};

/// Status of a durable Association row.
///
/// The Lifecycle Service is the sole writer; the Health Monitor only
/// signals transitions through its recovery callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStatus {
    Creating,
    Running,
    Unhealthy,
    Stopped,
    Error,
    Terminated,
}

impl AssociationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssociationStatus::Terminated)
    }
}

crate::simple_display! {
    AssociationStatus {
        Creating => "creating",
        Running => "running",
        Unhealthy => "unhealthy",
        Stopped => "stopped",
        Error => "error",
        Terminated => "terminated",
    }
}

/// Durable record keyed by `project_id` (§3 invariant 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub id: AssociationId,
    pub tenant_id: TenantId,
    pub project_id: ProjectId,
    pub sandbox_id: SandboxId,
    pub status: AssociationStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub last_health_check_at: Option<DateTime<Utc>>,
}

/// Host port range `0.0.0.0:<port>` triplet allocated atomically (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTriplet {
    pub mcp: u16,
    pub desktop: u16,
    pub terminal: u16,
}

impl PortTriplet {
    pub fn as_array(&self) -> [u16; 3] {
        [self.mcp, self.desktop, self.terminal]
    }

    pub fn overlaps(&self, other: &PortTriplet) -> bool {
        self.as_array().iter().any(|p| other.as_array().contains(p))
    }
}

/// `network_mode` option recognized by the Container Manager (§4.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    Bridge,
    None,
    Host,
    Container(String),
}

impl Default for NetworkMode {
    fn default() -> Self {
        NetworkMode::Bridge
    }
}

/// Security posture applied to every container the core creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityProfile {
    pub drop_all_capabilities: bool,
    pub no_new_privileges: bool,
    pub network_mode: NetworkMode,
    pub allowed_networks: Vec<String>,
    pub blocked_ports: Vec<u16>,
}

impl Default for SecurityProfile {
    fn default() -> Self {
        Self {
            drop_all_capabilities: true,
            no_new_privileges: true,
            network_mode: NetworkMode::default(),
            allowed_networks: Vec::new(),
            blocked_ports: Vec::new(),
        }
    }
}

/// Fully resolved configuration for one sandbox (profile + overrides applied).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub image: String,
    pub memory_limit: String,
    pub cpu_limit: f64,
    pub timeout_seconds: u64,
    pub desktop_enabled: bool,
    pub environment: BTreeMap<String, String>,
    pub security: SecurityProfile,
}

/// Per-call overrides a caller may supply to `get_or_create` (§4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxOverrides {
    pub memory_limit: Option<String>,
    pub cpu_limit: Option<f64>,
    pub timeout_seconds: Option<u64>,
    pub desktop_enabled: Option<bool>,
    pub environment: Option<BTreeMap<String, String>>,
}

/// Bit-exact label schema (§3 invariant 4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Labels {
    pub sandbox: bool,
    pub sandbox_id: SandboxId,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub created_at: DateTime<Utc>,
}

impl Labels {
    /// Render as the literal `memstack.*` key/value pairs a container carries.
    pub fn as_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("memstack.sandbox".to_string(), self.sandbox.to_string());
        map.insert("memstack.sandbox.id".to_string(), self.sandbox_id.to_string());
        map.insert("memstack.project_id".to_string(), self.project_id.to_string());
        map.insert("memstack.tenant_id".to_string(), self.tenant_id.to_string());
        map.insert(
            "memstack.created_at".to_string(),
            self.created_at.to_rfc3339(),
        );
        map
    }

    /// Parse labels back out of a container's raw label map. Returns `None`
    /// (an orphan, §3 invariant 4) when `memstack.project_id` is absent.
    pub fn from_map(raw: &BTreeMap<String, String>) -> Option<Labels> {
        let project_id = raw.get("memstack.project_id")?;
        let sandbox_id = raw.get("memstack.sandbox.id")?;
        let tenant_id = raw.get("memstack.tenant_id")?;
        let created_at = raw
            .get("memstack.created_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))?;
        Some(Labels {
            sandbox: raw.get("memstack.sandbox").map(|v| v == "true").unwrap_or(false),
            sandbox_id: SandboxId::from_string(sandbox_id),
            project_id: ProjectId::new(project_id),
            tenant_id: TenantId::new(tenant_id),
            created_at,
        })
    }
}

/// Runtime object owned by the Container Manager (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub runtime_id: String,
    pub labels: Labels,
    pub status: ContainerStatus,
    /// Host port triplet read back from the runtime's published port
    /// bindings; `None` when the runtime hasn't reported them yet (e.g. a
    /// container still in `created` state). Startup Sync (§4.7) relies on
    /// this to rebuild a Registry `Instance` without re-deriving ports.
    pub ports: Option<PortTriplet>,
}

/// Ground-truth container state as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    Exited,
    Dead,
    Created,
    Unknown,
}

/// URLs derived from a Port Triplet once a sandbox is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointUrls {
    pub websocket_url: String,
    pub desktop_url: Option<String>,
    pub terminal_url: Option<String>,
}

/// In-memory record keyed by `sandbox_id`, owned by the Sandbox Registry (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub sandbox_id: SandboxId,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub status: AssociationStatus,
    pub config: SandboxConfig,
    pub project_path: PathBuf,
    pub ports: PortTriplet,
    pub endpoint_urls: EndpointUrls,
    pub control_connected: bool,
    pub labels: Labels,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub tools_cache: Option<Vec<String>>,
}

/// Multi-level health probe outcome (§3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCheckLevel {
    Basic,
    Mcp,
    Services,
    Full,
}

crate::simple_display! {
    HealthCheckLevel {
        Basic => "basic",
        Mcp => "mcp",
        Services => "services",
        Full => "full",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub sandbox_id: SandboxId,
    pub level: HealthCheckLevel,
    pub status: HealthStatus,
    pub healthy: bool,
    pub details: BTreeMap<String, String>,
    pub errors: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<u64>,
}

/// `{sandbox_id, project_id, tenant_id, tool_names[], registered_at}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub sandbox_id: SandboxId,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub tool_names: Vec<String>,
    pub registered_at: DateTime<Utc>,
}

/// Cached `stats()` sample for one sandbox (§4.8 Resource Accounting).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub mem_mb: f64,
    pub mem_percent: f64,
    pub sampled_at_epoch_ms: u64,
}

/// A `get_or_create` held back by the host concurrency ceiling (§4.8).
#[derive(Debug, Clone)]
pub struct PendingCreation {
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub profile: crate::profile::ResourceProfile,
    pub overrides: SandboxOverrides,
    pub queued_at_epoch_ms: u64,
}

#[cfg(test)]
#[path = "domain_tests.rs"]
mod tests;
