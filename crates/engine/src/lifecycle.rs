// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle Service (§4.6): the orchestrator every caller-facing operation
//! goes through. Owns no locks of its own beyond the Association Store's
//! per-project advisory lock (§5) — everything else it delegates to the
//! Sandbox Registry, Resource Accounting, and the adapter ports.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sbx_adapters::{
    AssociationStore, ContainerRuntime, ControlChannelFactory, CreateSpec, EventPublisher,
};
use sbx_core::{
    Association, AssociationId, AssociationStatus, Clock, ContainerStatus, EndpointUrls,
    Instance, LifecycleEvent, LifecycleEventType, PendingCreation, ProjectId, ResourceProfile,
    SandboxConfig, SandboxError, SandboxId, SandboxOverrides, SandboxResult, TenantId,
};
use tracing::{debug, error, warn};

use crate::health_monitor::RecreateHandler;
use crate::port_allocator::PortProbe;
use crate::registry::Registry;
use crate::resource_accounting::ResourceAccounting;
use crate::ttl_cache::TtlCache;

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// How long `get_or_create`/`recreate`/`terminate` wait to acquire the
    /// per-project advisory lock before giving up (§4.6 step 1).
    pub advisory_lock_timeout: Duration,
    /// Host ceiling a requested config's `memory_limit` must not exceed,
    /// in megabytes (§4.6 Create-new step 4).
    pub max_host_memory_mb: f64,
    /// Host ceiling a requested config's `cpu_limit` must not exceed.
    pub max_host_cpu: f64,
    /// How recently `health_check` must have run before its cached result
    /// is reused rather than triggering a fresh probe.
    pub health_check_interval: Duration,
    /// Cooldown after a recreate before another may run for the same
    /// project, so a flapping container does not thrash (§4.6 Recreate).
    pub rebuild_cooldown: Duration,
    pub restart_max_retry_count: u32,
    pub auto_recover: bool,
    /// Root directory under which each project's workspace is mounted;
    /// `project_path` is `projects_root/project_id` (§4.6 Create-new step 2).
    pub projects_root: PathBuf,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            advisory_lock_timeout: Duration::from_secs(10),
            max_host_memory_mb: 16_384.0,
            max_host_cpu: 8.0,
            health_check_interval: Duration::from_secs(30),
            rebuild_cooldown: Duration::from_secs(30),
            restart_max_retry_count: 3,
            auto_recover: true,
            projects_root: PathBuf::from("/var/lib/memstack/sandboxes"),
        }
    }
}

/// Caller-facing view combining the durable Association with the Registry's
/// in-memory Instance, when one exists (§4.6).
#[derive(Debug, Clone)]
pub struct SandboxInfo {
    pub sandbox_id: SandboxId,
    pub project_id: ProjectId,
    pub tenant_id: TenantId,
    pub status: AssociationStatus,
    pub is_healthy: bool,
    pub mcp_port: Option<u16>,
    pub desktop_port: Option<u16>,
    pub terminal_port: Option<u16>,
    pub websocket_url: Option<String>,
    pub desktop_url: Option<String>,
    pub terminal_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub last_accessed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl SandboxInfo {
    fn from_parts(association: &Association, instance: Option<&Instance>) -> Self {
        Self {
            sandbox_id: association.sandbox_id.clone(),
            project_id: association.project_id.clone(),
            tenant_id: association.tenant_id.clone(),
            status: association.status,
            is_healthy: association.status == AssociationStatus::Running,
            mcp_port: instance.map(|i| i.ports.mcp),
            desktop_port: instance.map(|i| i.ports.desktop),
            terminal_port: instance.map(|i| i.ports.terminal),
            websocket_url: instance.map(|i| i.endpoint_urls.websocket_url.clone()),
            desktop_url: instance.and_then(|i| i.endpoint_urls.desktop_url.clone()),
            terminal_url: instance.and_then(|i| i.endpoint_urls.terminal_url.clone()),
            created_at: association.created_at,
            last_accessed_at: association.last_accessed_at,
        }
    }
}

pub struct LifecycleService<P: PortProbe, C: Clock> {
    registry: Arc<Registry<P>>,
    association_store: Arc<dyn AssociationStore>,
    container_runtime: Arc<dyn ContainerRuntime>,
    control_factory: Arc<dyn ControlChannelFactory>,
    event_publisher: Arc<dyn EventPublisher>,
    resource_accounting: Arc<ResourceAccounting<C>>,
    config: LifecycleConfig,
    clock: C,
    rebuild_cooldown: TtlCache<ProjectId, (), C>,
}

impl<P: PortProbe + 'static, C: Clock + 'static> LifecycleService<P, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<Registry<P>>,
        association_store: Arc<dyn AssociationStore>,
        container_runtime: Arc<dyn ContainerRuntime>,
        control_factory: Arc<dyn ControlChannelFactory>,
        event_publisher: Arc<dyn EventPublisher>,
        resource_accounting: Arc<ResourceAccounting<C>>,
        config: LifecycleConfig,
        clock: C,
    ) -> Self {
        let rebuild_cooldown = TtlCache::new(config.rebuild_cooldown, 10_000, clock.clone());
        Self {
            registry,
            association_store,
            container_runtime,
            control_factory,
            event_publisher,
            resource_accounting,
            config,
            clock,
            rebuild_cooldown,
        }
    }

    /// Exposes the rebuild-cooldown cache so it can be registered with the
    /// Health Monitor's TTL sweep (§4.5 `track_cache`).
    pub fn rebuild_cooldown_cache(&self) -> &TtlCache<ProjectId, (), C> {
        &self.rebuild_cooldown
    }

    fn project_path(&self, project_id: &ProjectId) -> PathBuf {
        self.config.projects_root.join(project_id.as_str())
    }

    /// Resolves `sandbox_id` to its Container Manager-assigned runtime id
    /// via label-based discovery and removes it, if one still exists. Never
    /// fails the caller — container removal here is always best-effort.
    async fn remove_by_sandbox_id(&self, sandbox_id: &SandboxId) {
        match self.container_runtime.get_by_sandbox_id(sandbox_id).await {
            Ok(Some(container)) => {
                if let Err(err) = self.container_runtime.remove(&container.runtime_id, true).await {
                    warn!(sandbox_id = %sandbox_id, error = %err, "best-effort container removal failed");
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(sandbox_id = %sandbox_id, error = %err, "container lookup failed during removal");
            }
        }
    }

    async fn emit(&self, event_type: LifecycleEventType, association: &Association) {
        let event = LifecycleEvent {
            event_type,
            sandbox_id: association.sandbox_id.clone(),
            project_id: association.project_id.clone(),
            tenant_id: association.tenant_id.clone(),
            timestamp: chrono::Utc::now(),
            payload: serde_json::json!({ "status": association.status.to_string() }),
        };
        if let Err(err) = self.event_publisher.publish(event).await {
            warn!(project_id = %association.project_id, error = %err, "failed to publish lifecycle event");
        }
    }

    /// §4.6 `get_or_create`: guarantees the single-sandbox invariant.
    pub async fn get_or_create(
        &self,
        project_id: &ProjectId,
        tenant_id: &TenantId,
        profile: Option<ResourceProfile>,
        overrides: Option<SandboxOverrides>,
    ) -> SandboxResult<SandboxInfo> {
        let profile = profile.unwrap_or_default();
        let overrides = overrides.unwrap_or_default();

        let lock = self
            .association_store
            .acquire_project_lock(project_id, self.config.advisory_lock_timeout)
            .await
            .map_err(SandboxError::from)?;

        let result = self.get_or_create_locked(project_id, tenant_id, profile, overrides).await;
        lock.release();
        result
    }

    async fn get_or_create_locked(
        &self,
        project_id: &ProjectId,
        tenant_id: &TenantId,
        profile: ResourceProfile,
        overrides: SandboxOverrides,
    ) -> SandboxResult<SandboxInfo> {
        let existing = self
            .association_store
            .find_and_lock_by_project(project_id)
            .await
            .map_err(SandboxError::from)?;

        let Some(mut association) = existing else {
            return self.create_new(project_id, tenant_id, profile, overrides).await;
        };

        match association.status {
            AssociationStatus::Running => {
                let confirmed = self
                    .container_runtime
                    .container_exists(&association.sandbox_id)
                    .await
                    .map_err(SandboxError::from)?;
                if confirmed {
                    association.last_accessed_at = Some(chrono::Utc::now());
                    self.association_store.save(association.clone()).await.map_err(SandboxError::from)?;
                    let instance = self.registry.get(&association.sandbox_id);
                    Ok(SandboxInfo::from_parts(&association, instance.as_ref()))
                } else {
                    association.status = AssociationStatus::Unhealthy;
                    self.association_store.save(association.clone()).await.map_err(SandboxError::from)?;
                    self.recreate(association, project_id, tenant_id, profile, overrides).await
                }
            }
            AssociationStatus::Stopped => {
                self.recreate(association, project_id, tenant_id, profile, overrides).await
            }
            AssociationStatus::Error => {
                self.registry.remove(&association.sandbox_id);
                self.remove_by_sandbox_id(&association.sandbox_id).await;
                self.create_new(project_id, tenant_id, profile, overrides).await
            }
            AssociationStatus::Unhealthy if self.config.auto_recover => {
                self.recreate(association, project_id, tenant_id, profile, overrides).await
            }
            AssociationStatus::Unhealthy | AssociationStatus::Creating | AssociationStatus::Terminated => {
                // Creating: the advisory lock serializes concurrent callers, so by
                // the time we hold it the winner has already finished (§9 Open
                // question a). Terminated/unhealthy-without-auto-recover: start over.
                let instance = self.registry.get(&association.sandbox_id);
                if association.status == AssociationStatus::Creating && instance.is_some() {
                    Ok(SandboxInfo::from_parts(&association, instance.as_ref()))
                } else {
                    self.create_new(project_id, tenant_id, profile, overrides).await
                }
            }
        }
    }

    /// §4.6 Create-new.
    async fn create_new(
        &self,
        project_id: &ProjectId,
        tenant_id: &TenantId,
        profile: ResourceProfile,
        overrides: SandboxOverrides,
    ) -> SandboxResult<SandboxInfo> {
        if !self.resource_accounting.can_create(self.registry.as_ref()) {
            // queue() dedups by project_id: a caller retrying get_or_create while
            // still at capacity must not mint a second pending entry for the same
            // project, or draining a freed slot would create it twice (P1).
            let newly_queued = self.resource_accounting.queue(PendingCreation {
                project_id: project_id.clone(),
                tenant_id: tenant_id.clone(),
                profile,
                overrides,
                queued_at_epoch_ms: self.clock.epoch_ms(),
            });
            let detail = if newly_queued { "queued creation" } else { "already queued" };
            return Err(SandboxError::Conflict(format!("host at capacity, {detail} for project {project_id}")));
        }

        let config = profile.resolve("memstack/sandbox:latest", &overrides);
        validate_resource_ceilings(&config, self.config.max_host_memory_mb, self.config.max_host_cpu)?;

        let sandbox_id = SandboxId::new();
        let project_path = self.project_path(project_id);

        let mut association = Association {
            id: AssociationId::new(),
            tenant_id: tenant_id.clone(),
            project_id: project_id.clone(),
            sandbox_id: sandbox_id.clone(),
            status: AssociationStatus::Creating,
            error_message: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            last_accessed_at: Some(chrono::Utc::now()),
            last_health_check_at: None,
        };
        self.association_store.save(association.clone()).await.map_err(SandboxError::from)?;

        match self.start_container(&sandbox_id, project_id, tenant_id, &project_path, &config).await {
            Ok(instance) => {
                association.status = AssociationStatus::Running;
                association.started_at = Some(chrono::Utc::now());
                self.association_store.save(association.clone()).await.map_err(SandboxError::from)?;
                self.emit(LifecycleEventType::SandboxCreated, &association).await;
                Ok(SandboxInfo::from_parts(&association, Some(&instance)))
            }
            Err(err) => {
                association.status = AssociationStatus::Error;
                association.error_message = Some(err.to_string());
                let _ = self.association_store.save(association.clone()).await;
                Err(err)
            }
        }
    }

    /// Allocates ports, asks the Container Manager to create and start,
    /// registers the Instance, and attempts (but does not require) a
    /// control-channel connection (§4.6 Create-new steps 2, 5, 6).
    async fn start_container(
        &self,
        sandbox_id: &SandboxId,
        project_id: &ProjectId,
        tenant_id: &TenantId,
        project_path: &std::path::Path,
        config: &SandboxConfig,
    ) -> SandboxResult<Instance> {
        let ports = self.registry.allocate_ports().await?;

        let labels = sbx_core::Labels {
            sandbox: true,
            sandbox_id: sandbox_id.clone(),
            project_id: project_id.clone(),
            tenant_id: tenant_id.clone(),
            created_at: chrono::Utc::now(),
        };

        let spec = CreateSpec {
            sandbox_id,
            project_path,
            ports,
            config,
            labels: labels.as_map(),
            env: config.environment.clone(),
            restart_max_retry_count: self.config.restart_max_retry_count,
        };

        let container = match self.container_runtime.create(spec).await {
            Ok(container) => container,
            Err(err) => {
                self.registry.release_ports(ports);
                return Err(err.into());
            }
        };
        if let Err(err) = self.container_runtime.start(&container.runtime_id).await {
            self.registry.release_ports(ports);
            return Err(err.into());
        }

        let websocket_url = format!("ws://127.0.0.1:{}", ports.mcp);
        let instance = Instance {
            sandbox_id: sandbox_id.clone(),
            project_id: project_id.clone(),
            tenant_id: tenant_id.clone(),
            status: AssociationStatus::Running,
            config: config.clone(),
            project_path: project_path.to_path_buf(),
            ports,
            endpoint_urls: EndpointUrls {
                websocket_url: websocket_url.clone(),
                desktop_url: config.desktop_enabled.then(|| format!("http://127.0.0.1:{}", ports.desktop)),
                terminal_url: Some(format!("http://127.0.0.1:{}", ports.terminal)),
            },
            control_connected: false,
            labels,
            created_at: chrono::Utc::now(),
            last_activity_at: None,
            tools_cache: None,
        };
        self.registry.insert(instance.clone());

        match self.control_factory.connect(sandbox_id, &websocket_url, self.config.advisory_lock_timeout).await {
            Ok(channel) => self.registry.set_control_channel(sandbox_id, channel),
            Err(err) => {
                warn!(sandbox_id = %sandbox_id, error = %err, "control channel connect failed, deferring to health monitor");
            }
        }

        Ok(self.registry.get(sandbox_id).unwrap_or(instance))
    }

    /// §4.6 Recreate: preserves Association identity, mints a new
    /// `sandbox_id`, best-effort tears down the old container, creates a
    /// new one. Guarded by the rebuild cooldown so a flapping container
    /// does not thrash.
    async fn recreate(
        &self,
        association: Association,
        project_id: &ProjectId,
        tenant_id: &TenantId,
        profile: ResourceProfile,
        overrides: SandboxOverrides,
    ) -> SandboxResult<SandboxInfo> {
        if self.rebuild_cooldown.get(project_id).is_some() {
            return Err(SandboxError::Conflict(format!(
                "recreate suppressed by rebuild cooldown for project {project_id}"
            )));
        }
        self.rebuild_cooldown.set(project_id.clone(), (), None);

        let old_sandbox_id = association.sandbox_id.clone();
        self.registry.remove(&old_sandbox_id);
        self.remove_by_sandbox_id(&old_sandbox_id).await;

        let mut terminated = association.clone();
        terminated.status = AssociationStatus::Terminated;
        self.emit(LifecycleEventType::SandboxTerminated, &terminated).await;

        let result = self.create_new(project_id, tenant_id, profile, overrides).await;

        if result.is_ok() {
            self.spawn_recreate_fixups(&old_sandbox_id, project_id);
        }
        result
    }

    /// Best-effort background fix-ups after a recreate (§4.6 Recreate):
    /// reinstalling previously-registered auxiliary MCP servers and
    /// invalidating cached UI resources the old sandbox served. Neither
    /// adapter port is in scope for this crate's Non-goals, so both are
    /// logged rather than executed.
    fn spawn_recreate_fixups(&self, old_sandbox_id: &SandboxId, project_id: &ProjectId) {
        debug!(
            old_sandbox_id = %old_sandbox_id,
            project_id = %project_id,
            "recreate complete, fix-up hooks would run here"
        );
    }

    /// `ensure_running`: the operation `execute_tool`'s contract names as
    /// its precondition (§4.6 `execute_tool`, §9 Open question b) — callers
    /// that need a live sandbox call this first rather than relying on
    /// `execute_tool` to create one transparently. It is a thin alias over
    /// `get_or_create`: that is the operation that already walks a sandbox
    /// through `unhealthy -> creating -> running` when the container has
    /// gone missing (scenario 3), so `ensure_running` is its realization
    /// under the name callers are expected to reach for.
    pub async fn ensure_running(
        &self,
        project_id: &ProjectId,
        tenant_id: &TenantId,
    ) -> SandboxResult<SandboxInfo> {
        self.get_or_create(project_id, tenant_id, None, None).await
    }

    /// §4.6 `execute_tool`: never auto-creates (§9 Open question b) —
    /// callers that need a live sandbox must call [`Self::ensure_running`] first.
    pub async fn execute_tool(
        &self,
        project_id: &ProjectId,
        tool_name: &str,
        arguments: serde_json::Value,
        timeout: Duration,
    ) -> SandboxResult<serde_json::Value> {
        let mut association = self
            .association_store
            .find_by_project(project_id)
            .await
            .map_err(SandboxError::from)?
            .ok_or_else(|| SandboxError::NotFound(project_id.clone()))?;

        let channel = self
            .registry
            .control_channel(&association.sandbox_id)
            .ok_or_else(|| SandboxError::ControlChannelError("no control channel connected".to_string()))?;

        association.last_accessed_at = Some(chrono::Utc::now());
        self.association_store.save(association).await.map_err(SandboxError::from)?;

        channel.call_tool(tool_name, arguments, timeout).await.map_err(SandboxError::from)
    }

    /// §4.6 `health_check`: returns the cached result if recent enough,
    /// otherwise triggers a fresh probe and updates Association status.
    pub async fn health_check(&self, project_id: &ProjectId) -> SandboxResult<bool> {
        let mut association = self
            .association_store
            .find_by_project(project_id)
            .await
            .map_err(SandboxError::from)?
            .ok_or_else(|| SandboxError::NotFound(project_id.clone()))?;

        if let Some(last) = association.last_health_check_at {
            let elapsed = chrono::Utc::now() - last;
            if elapsed < chrono::Duration::from_std(self.config.health_check_interval).unwrap_or_default() {
                return Ok(association.status == AssociationStatus::Running);
            }
        }

        let Some(instance) = self.registry.get(&association.sandbox_id) else {
            association.status = AssociationStatus::Error;
            association.last_health_check_at = Some(chrono::Utc::now());
            self.association_store.save(association).await.map_err(SandboxError::from)?;
            return Ok(false);
        };

        let existing_channel = self.registry.control_channel(&association.sandbox_id);
        let params = crate::health::CheckParams {
            sandbox_id: &association.sandbox_id,
            endpoint_url: &instance.endpoint_urls.websocket_url,
            desktop_enabled: instance.config.desktop_enabled,
            level: sbx_core::HealthCheckLevel::Mcp,
            basic_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(10),
        };
        let (result, channel) = crate::health::check(
            params,
            self.container_runtime.as_ref(),
            self.control_factory.as_ref(),
            existing_channel,
        )
        .await;

        match &channel {
            Some(c) => self.registry.set_control_channel(&association.sandbox_id, c.clone()),
            None => self.registry.clear_control_channel(&association.sandbox_id),
        }

        association.status = if result.healthy { AssociationStatus::Running } else { AssociationStatus::Unhealthy };
        association.last_health_check_at = Some(chrono::Utc::now());
        self.association_store.save(association).await.map_err(SandboxError::from)?;

        Ok(result.healthy)
    }

    /// §4.6 `terminate`.
    pub async fn terminate(&self, project_id: &ProjectId, purge: bool) -> SandboxResult<bool> {
        let Some(mut association) =
            self.association_store.find_by_project(project_id).await.map_err(SandboxError::from)?
        else {
            return Ok(false);
        };

        self.registry.remove(&association.sandbox_id);
        self.remove_by_sandbox_id(&association.sandbox_id).await;

        association.status = AssociationStatus::Terminated;
        self.emit(LifecycleEventType::SandboxTerminated, &association).await;

        if purge {
            self.association_store.delete(&association.id).await.map_err(SandboxError::from)?;
        } else {
            self.association_store.save(association).await.map_err(SandboxError::from)?;
        }

        let drained = self.resource_accounting.drain_ready(self.registry.as_ref());
        for request in drained {
            // Re-enter through get_or_create rather than calling create_new
            // directly: this re-acquires the per-project advisory lock and
            // re-reads the Association, so a project that was created or
            // terminated by someone else while queued is handled correctly
            // instead of unconditionally minting a second sandbox (P1).
            if let Err(err) = self
                .get_or_create(&request.project_id, &request.tenant_id, Some(request.profile), Some(request.overrides))
                .await
            {
                error!(project_id = %request.project_id, error = %err, "failed to drain queued creation");
            }
        }

        Ok(true)
    }

    /// §4.6 `cleanup_stale`: honors the minimum-age guard of §4.8 so a
    /// sandbox still completing its handshake is never reaped.
    pub async fn cleanup_stale(&self, max_idle_seconds: u64, dry_run: bool) -> SandboxResult<Vec<SandboxId>> {
        let stale = self
            .association_store
            .find_stale(max_idle_seconds, 1000)
            .await
            .map_err(SandboxError::from)?;

        let min_age = self.resource_accounting.min_age_for_cleanup();
        let mut reaped = Vec::new();
        for association in stale {
            let age = chrono::Utc::now() - association.created_at;
            if age < chrono::Duration::from_std(min_age).unwrap_or_default() {
                continue;
            }
            reaped.push(association.sandbox_id.clone());
            if !dry_run {
                if let Err(err) = self.terminate(&association.project_id, false).await {
                    error!(project_id = %association.project_id, error = %err, "cleanup_stale terminate failed");
                }
            }
        }
        Ok(reaped)
    }

    /// §4.6 `sync_status`: reconciles the Association with runtime ground
    /// truth. Used per-project by callers; the startup-wide reconciliation
    /// pass lives in [`crate::startup_sync`].
    pub async fn sync_status(&self, project_id: &ProjectId) -> SandboxResult<SandboxInfo> {
        let mut association = self
            .association_store
            .find_by_project(project_id)
            .await
            .map_err(SandboxError::from)?
            .ok_or_else(|| SandboxError::NotFound(project_id.clone()))?;

        if association.status.is_terminal() {
            let instance = self.registry.get(&association.sandbox_id);
            return Ok(SandboxInfo::from_parts(&association, instance.as_ref()));
        }

        let container = self
            .container_runtime
            .get_by_sandbox_id(&association.sandbox_id)
            .await
            .map_err(SandboxError::from)?;

        association.status = match container {
            None => AssociationStatus::Error,
            Some(c) => match c.status {
                ContainerStatus::Running => AssociationStatus::Running,
                ContainerStatus::Exited | ContainerStatus::Dead => AssociationStatus::Stopped,
                ContainerStatus::Created | ContainerStatus::Unknown => association.status,
            },
        };
        self.association_store.save(association.clone()).await.map_err(SandboxError::from)?;

        let instance = self.registry.get(&association.sandbox_id);
        Ok(SandboxInfo::from_parts(&association, instance.as_ref()))
    }
}

/// §4.6 Create-new step 4: reject configs whose memory or CPU exceed the
/// host's max, surfacing the failure reason. Parsing mirrors the Docker
/// adapter's own `memory_limit` convention (`g`/`m`/`k` suffix, bytes otherwise).
fn validate_resource_ceilings(config: &SandboxConfig, max_memory_mb: f64, max_cpu: f64) -> SandboxResult<()> {
    let requested_mb = parse_memory_limit_mb(&config.memory_limit)?;
    if requested_mb > max_memory_mb {
        return Err(SandboxError::ResourceRejected(format!(
            "requested memory {requested_mb}m exceeds host ceiling {max_memory_mb}m"
        )));
    }
    if config.cpu_limit > max_cpu {
        return Err(SandboxError::ResourceRejected(format!(
            "requested cpu {} exceeds host ceiling {max_cpu}", config.cpu_limit
        )));
    }
    Ok(())
}

fn parse_memory_limit_mb(limit: &str) -> SandboxResult<f64> {
    let lower = limit.trim().to_ascii_lowercase();
    let (digits, multiplier): (&str, f64) = if let Some(n) = lower.strip_suffix('g') {
        (n, 1024.0)
    } else if let Some(n) = lower.strip_suffix('m') {
        (n, 1.0)
    } else if let Some(n) = lower.strip_suffix('k') {
        (n, 1.0 / 1024.0)
    } else {
        (lower.as_str(), 1.0 / (1024.0 * 1024.0))
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|v| v * multiplier)
        .map_err(|_| SandboxError::ResourceRejected(format!("invalid memory_limit: {limit}")))
}

#[async_trait]
impl<P: PortProbe + 'static, C: Clock + 'static> RecreateHandler for LifecycleService<P, C> {
    async fn recreate_sandbox(&self, sandbox_id: &SandboxId) -> SandboxResult<()> {
        let association = self
            .association_store
            .find_by_sandbox(sandbox_id)
            .await
            .map_err(SandboxError::from)?
            .ok_or_else(|| SandboxError::SandboxNotFound(sandbox_id.clone()))?;
        let project_id = association.project_id.clone();
        let tenant_id = association.tenant_id.clone();
        self.recreate(association, &project_id, &tenant_id, ResourceProfile::default(), SandboxOverrides::default())
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
