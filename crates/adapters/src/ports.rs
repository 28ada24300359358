// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable ports implemented by pluggable adapters (§9 Dynamic dispatch).
//!
//! Every operation here is blocking from the runtime's point of view and
//! must be dispatched onto the tokio blocking pool by callers that hold a
//! Registry lock (§5 Lock hygiene, P5) — none of these traits take a lock
//! themselves.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sbx_core::{
    Association, AssociationId, AssociationStatus, Container, LifecycleEvent, PortTriplet,
    ProjectId, SandboxConfig, SandboxId, TenantId,
};

use crate::error::AdapterResult;

/// Durable mapping project→sandbox with row-level locking (§6).
///
/// All operations are idempotent where applicable. `acquire_project_lock` /
/// `release_project_lock` implement the session-scoped advisory lock that
/// serializes `get_or_create`, `recreate`, and `terminate` for one
/// `project_id` across all serving processes (§5).
#[async_trait]
pub trait AssociationStore: Send + Sync {
    async fn find_by_project(&self, project_id: &ProjectId) -> AdapterResult<Option<Association>>;
    async fn find_by_id(&self, id: &AssociationId) -> AdapterResult<Option<Association>>;
    async fn find_by_sandbox(&self, sandbox_id: &SandboxId) -> AdapterResult<Option<Association>>;
    async fn find_by_tenant(
        &self,
        tenant_id: &TenantId,
        status: Option<AssociationStatus>,
        limit: usize,
        offset: usize,
    ) -> AdapterResult<Vec<Association>>;
    async fn find_stale(&self, max_idle_seconds: u64, limit: usize) -> AdapterResult<Vec<Association>>;
    async fn save(&self, association: Association) -> AdapterResult<()>;
    async fn delete(&self, id: &AssociationId) -> AdapterResult<()>;
    async fn delete_by_project(&self, project_id: &ProjectId) -> AdapterResult<()>;
    async fn exists_for_project(&self, project_id: &ProjectId) -> AdapterResult<bool>;

    /// Block (or fail fast past `timeout`) until the caller holds the
    /// cluster-wide advisory lock for `project_id`. FIFO across waiters.
    async fn acquire_project_lock(
        &self,
        project_id: &ProjectId,
        timeout: std::time::Duration,
    ) -> AdapterResult<ProjectLockGuard>;

    /// `SELECT ... FOR UPDATE` equivalent: re-reads the row while already
    /// holding the project lock.
    async fn find_and_lock_by_project(
        &self,
        project_id: &ProjectId,
    ) -> AdapterResult<Option<Association>>;
}

/// Held for the duration of one serialized lifecycle operation; releasing
/// is explicit (rather than solely `Drop`-based) so callers can observe and
/// log release failures, matching §5's "must release on every exit path".
pub struct ProjectLockGuard {
    pub project_id: ProjectId,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ProjectLockGuard {
    pub fn new(project_id: ProjectId, release: impl FnOnce() + Send + 'static) -> Self {
        Self { project_id, release: Some(Box::new(release)) }
    }

    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ProjectLockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Fire-and-forget emission of lifecycle events (§6). Publication never
/// fails the originating lifecycle operation: implementations should log
/// and swallow their own errors rather than return them where avoidable,
/// but the trait still returns a `Result` so adapters with a real transport
/// can report backpressure to the caller if useful for diagnostics.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: LifecycleEvent) -> AdapterResult<()>;
}

/// Bind mount, e.g. `project_path -> /workspace` read-write (§4.2, §3 invariant 6).
#[derive(Debug, Clone)]
pub struct Mount {
    pub host_path: std::path::PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

/// Everything the Container Manager needs to create one sandbox container.
#[derive(Debug, Clone)]
pub struct CreateSpec<'a> {
    pub sandbox_id: &'a SandboxId,
    pub project_path: &'a Path,
    pub ports: PortTriplet,
    pub config: &'a SandboxConfig,
    pub labels: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub restart_max_retry_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub mem_mb: f64,
    pub mem_percent: f64,
}

/// Abstracted surface sufficient to implement against any OCI-compatible
/// daemon (§6 Container Runtime port).
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn pull_image_if_absent(&self, image: &str) -> AdapterResult<()>;
    async fn create(&self, spec: CreateSpec<'_>) -> AdapterResult<Container>;
    async fn start(&self, runtime_id: &str) -> AdapterResult<()>;
    async fn stop(&self, runtime_id: &str, timeout: std::time::Duration) -> AdapterResult<()>;
    async fn remove(&self, runtime_id: &str, force: bool) -> AdapterResult<()>;
    async fn get_by_id(&self, runtime_id: &str) -> AdapterResult<Option<Container>>;
    async fn get_by_sandbox_id(&self, sandbox_id: &SandboxId) -> AdapterResult<Option<Container>>;
    async fn list_sandbox_containers(
        &self,
        project_id: Option<&ProjectId>,
        tenant_id: Option<&TenantId>,
    ) -> AdapterResult<Vec<Container>>;
    async fn container_exists(&self, sandbox_id: &SandboxId) -> AdapterResult<bool>;
    async fn is_running(&self, runtime_id: &str) -> AdapterResult<bool>;
    async fn stats(&self, runtime_id: &str) -> AdapterResult<ContainerStats>;
    /// Removes containers satisfying the orphan criteria of §3 invariant 4 /
    /// §4.7; returns the count removed.
    async fn cleanup_orphans(&self, grace_period: std::time::Duration) -> AdapterResult<u32>;
    /// Interactive shell session (exec attach with a TTY).
    async fn exec(&self, runtime_id: &str, command: &[String]) -> AdapterResult<String>;
}

/// The bidirectional message channel used to talk to one sandbox's internal
/// agent (glossary: Control channel). Opaque at this level — the wire
/// protocol is explicitly out of scope (§1 Non-goals) — but the Health
/// Monitor and Lifecycle Service need *something* to connect, ping, and
/// call tools through, so it is exposed as a port like any other external
/// collaborator.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// MCP-level probe (§4.5): a ping over the already-open connection.
    /// Heartbeats use a generous timeout (≥ 30s) to tolerate a sandbox
    /// busy executing a long tool call.
    async fn ping(&self, timeout: Duration) -> AdapterResult<()>;

    /// SERVICES-level probe: ask the sandbox's own introspection tool
    /// which optional subsystems (desktop, terminal, ...) are running.
    async fn list_running_services(&self, timeout: Duration) -> AdapterResult<Vec<String>>;

    /// FULL-level probe: execute a trivial command and expect success.
    async fn exec_probe(&self, timeout: Duration) -> AdapterResult<()>;

    /// Invoke one tool by name (`execute_tool`, §4.6).
    async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> AdapterResult<serde_json::Value>;

    /// List tool names the sandbox currently exposes (populates
    /// `Instance::tools_cache`).
    async fn list_tools(&self, timeout: Duration) -> AdapterResult<Vec<String>>;
}

/// Establishes (and re-establishes) a [`ControlChannel`] for one sandbox,
/// addressed by its `mcp_port`-derived websocket endpoint.
#[async_trait]
pub trait ControlChannelFactory: Send + Sync {
    async fn connect(
        &self,
        sandbox_id: &SandboxId,
        endpoint_url: &str,
        timeout: Duration,
    ) -> AdapterResult<Arc<dyn ControlChannel>>;
}
