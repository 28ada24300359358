// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup Sync (§4.7): runs exactly once per serving process, before any
//! caller-facing request is served.
//!
//! Two passes: rebuild the Sandbox Registry's in-memory Instances from
//! labeled containers the runtime already knows about (ground truth after a
//! restart), then ask the Lifecycle Service to reconcile each one's
//! Association status. Re-running this is harmless — `Registry::insert`
//! overwrites by `sandbox_id`, and `sync_status` recomputes status from the
//! same ground truth each time (P6 Idempotent startup sync).
//!
//! The Association Store's ports expose lookup by project/sandbox/tenant
//! but not a full table scan, so reconciliation is driven by the
//! containers the runtime reports rather than by iterating every
//! Association — an Association whose container vanished entirely while
//! the process was down surfaces later, through the health loop's own
//! `container_exists` check, rather than here.

use sbx_adapters::ContainerRuntime;
use sbx_core::{Clock, EndpointUrls, Instance, ResourceProfile, SandboxOverrides, SandboxResult};
use tracing::{debug, warn};

use crate::lifecycle::LifecycleService;
use crate::port_allocator::PortProbe;
use crate::registry::Registry;

#[derive(Debug, Clone, Default)]
pub struct StartupSyncStats {
    pub containers_observed: usize,
    pub instances_registered: usize,
    pub associations_reconciled: usize,
    pub errors: Vec<String>,
}

/// Runs the two-pass reconciliation described above. Callers gate
/// request-serving on this returning, per §4.7 "requests served before
/// sync is complete wait on a single gate" (the gate itself is the
/// daemon's responsibility — this function just does the work it waits on).
pub async fn startup_sync<P, C>(
    registry: &Registry<P>,
    container_runtime: &dyn ContainerRuntime,
    lifecycle: &LifecycleService<P, C>,
) -> SandboxResult<StartupSyncStats>
where
    P: PortProbe + 'static,
    C: Clock + 'static,
{
    let mut stats = StartupSyncStats::default();

    let containers = container_runtime.list_sandbox_containers(None, None).await?;
    stats.containers_observed = containers.len();

    for container in &containers {
        let Some(ports) = container.ports else {
            debug!(sandbox_id = %container.labels.sandbox_id, "container has no published ports yet, skipping instance rebuild");
            continue;
        };

        // The runtime doesn't hand back the resource profile a container
        // was created with, so the rebuilt Instance carries best-effort
        // defaults; the fields that matter for serving traffic — ports,
        // labels, status — all come straight from the container itself.
        let config = ResourceProfile::Standard.resolve("unknown", &SandboxOverrides::default());
        let instance = Instance {
            sandbox_id: container.labels.sandbox_id.clone(),
            project_id: container.labels.project_id.clone(),
            tenant_id: container.labels.tenant_id.clone(),
            status: sbx_core::AssociationStatus::Running,
            config: config.clone(),
            project_path: std::path::PathBuf::new(),
            ports,
            endpoint_urls: EndpointUrls {
                websocket_url: format!("ws://127.0.0.1:{}", ports.mcp),
                desktop_url: config.desktop_enabled.then(|| format!("http://127.0.0.1:{}", ports.desktop)),
                terminal_url: Some(format!("http://127.0.0.1:{}", ports.terminal)),
            },
            control_connected: false,
            labels: container.labels.clone(),
            created_at: container.labels.created_at,
            last_activity_at: None,
            tools_cache: None,
        };
        registry.insert(instance);
        stats.instances_registered += 1;
    }

    for container in &containers {
        match lifecycle.sync_status(&container.labels.project_id).await {
            Ok(_) => stats.associations_reconciled += 1,
            Err(err) => {
                warn!(
                    project_id = %container.labels.project_id,
                    error = %err,
                    "startup sync failed to reconcile association status"
                );
                stats.errors.push(err.to_string());
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
#[path = "startup_sync_tests.rs"]
mod tests;
