// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-level health probe (§4.5): `BASIC ⊂ MCP ⊂ SERVICES ⊂ FULL`, each
//! level a strict superset of the checks below it. Called by the Health
//! Monitor's health loop and by the Lifecycle Service's `health_check`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sbx_adapters::{ContainerRuntime, ControlChannel, ControlChannelFactory};
use sbx_core::{ContainerStatus, HealthCheckLevel, HealthResult, HealthStatus, SandboxId};

/// Everything one `check` call needs to know about the sandbox being probed.
pub struct CheckParams<'a> {
    pub sandbox_id: &'a SandboxId,
    pub endpoint_url: &'a str,
    pub desktop_enabled: bool,
    pub level: HealthCheckLevel,
    pub basic_timeout: Duration,
    pub call_timeout: Duration,
}

/// Runs the requested level's checks and, for MCP and above, attempts a
/// single reconnect if no connection is currently open. Returns the result
/// plus the control channel handle to keep (a freshly reconnected one, the
/// one passed in, or `None`) so the caller can update the Registry.
pub async fn check(
    params: CheckParams<'_>,
    container_runtime: &dyn ContainerRuntime,
    control_factory: &dyn ControlChannelFactory,
    existing_channel: Option<Arc<dyn ControlChannel>>,
) -> (HealthResult, Option<Arc<dyn ControlChannel>>) {
    let started = Instant::now();
    let mut details = BTreeMap::new();
    let mut errors = Vec::new();

    // Container Manager discovery is label-based (§3 invariant 4, §4.2): we
    // never cache a runtime id ourselves, always re-resolve via the sandbox
    // id so a container recreated out-of-band is picked up correctly.
    let is_running = match container_runtime.get_by_sandbox_id(params.sandbox_id).await {
        Ok(Some(container)) => container.status == ContainerStatus::Running,
        Ok(None) => false,
        Err(err) => {
            errors.push(format!("container probe failed: {err}"));
            false
        }
    };
    details.insert("container_running".to_string(), is_running.to_string());

    if !is_running {
        errors.push("container not running".to_string());
        return (
            finish(params.sandbox_id, params.level, HealthStatus::Unhealthy, false, details, errors, started),
            existing_channel,
        );
    }

    if params.level == HealthCheckLevel::Basic {
        return (
            finish(params.sandbox_id, params.level, HealthStatus::Healthy, true, details, errors, started),
            existing_channel,
        );
    }

    // MCP: connection must be open; transparently attempt one reconnect.
    let mut channel = existing_channel;
    let mut connected = match &channel {
        Some(c) => c.is_connected().await,
        None => false,
    };
    if !connected {
        match control_factory
            .connect(params.sandbox_id, params.endpoint_url, params.call_timeout)
            .await
        {
            Ok(reconnected) => {
                connected = true;
                channel = Some(reconnected);
            }
            Err(err) => {
                errors.push(format!("reconnect failed: {err}"));
            }
        }
    }
    details.insert("control_channel_connected".to_string(), connected.to_string());

    if !connected {
        return (
            finish(params.sandbox_id, params.level, HealthStatus::Unhealthy, false, details, errors, started),
            channel,
        );
    }

    if params.level == HealthCheckLevel::Mcp {
        return (
            finish(params.sandbox_id, params.level, HealthStatus::Healthy, true, details, errors, started),
            channel,
        );
    }

    // SERVICES: optional subsystems reported by the sandbox's own introspection.
    let mut expected = vec!["terminal".to_string()];
    if params.desktop_enabled {
        expected.push("desktop".to_string());
    }
    let running_services = match channel.as_ref() {
        Some(c) => c.list_running_services(params.call_timeout).await.unwrap_or_default(),
        None => Vec::new(),
    };
    let missing: Vec<&String> =
        expected.iter().filter(|svc| !running_services.contains(svc)).collect();
    details.insert("services_expected".to_string(), expected.join(","));
    details.insert("services_running".to_string(), running_services.join(","));
    for svc in &missing {
        errors.push(format!("subsystem not running: {svc}"));
    }

    let services_status = match missing.len() {
        0 => HealthStatus::Healthy,
        1 => HealthStatus::Degraded,
        _ => HealthStatus::Unhealthy,
    };

    if params.level == HealthCheckLevel::Services || services_status == HealthStatus::Unhealthy {
        let healthy = services_status != HealthStatus::Unhealthy;
        return (
            finish(params.sandbox_id, params.level, services_status, healthy, details, errors, started),
            channel,
        );
    }

    // FULL: trivial probe command must succeed.
    let probe_ok = match channel.as_ref() {
        Some(c) => c.exec_probe(params.call_timeout).await.is_ok(),
        None => false,
    };
    details.insert("probe_ok".to_string(), probe_ok.to_string());
    if !probe_ok {
        errors.push("probe command failed".to_string());
    }

    let final_status = if !probe_ok { HealthStatus::Unhealthy } else { services_status };
    let healthy = final_status != HealthStatus::Unhealthy;
    (finish(params.sandbox_id, params.level, final_status, healthy, details, errors, started), channel)
}

fn finish(
    sandbox_id: &SandboxId,
    level: HealthCheckLevel,
    status: HealthStatus,
    healthy: bool,
    details: BTreeMap<String, String>,
    errors: Vec<String>,
    started: Instant,
) -> HealthResult {
    HealthResult {
        sandbox_id: sandbox_id.clone(),
        level,
        status,
        healthy,
        details,
        errors,
        timestamp: chrono::Utc::now(),
        latency_ms: Some(started.elapsed().as_millis() as u64),
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
