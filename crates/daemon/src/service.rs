// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assembles the adapters and engine layers into a runnable service and
//! owns the background loops' lifetimes.

use std::sync::Arc;

use sbx_adapters::{
    AssociationStore, BollardContainerRuntime, ContainerRuntime, ControlChannelFactory,
    EventPublisher, InMemoryAssociationStore, LoggingEventPublisher, WsControlChannelFactory,
};
use sbx_core::SystemClock;
use sbx_engine::{
    startup_sync, HealthMonitor, HealthMonitorConfig, LifecycleConfig, LifecycleService,
    OrphanCleaner, Registry, ResourceAccounting, StartupSyncStats, TcpPortProbe,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::DaemonError;

type Clock = SystemClock;
type Probe = TcpPortProbe;

/// The fully wired daemon: every component named in §2 behind the ports
/// `sbx-adapters` defines, ready to serve once [`Service::startup_sync`]
/// has run.
pub struct Service {
    pub registry: Arc<Registry<Probe>>,
    pub lifecycle: Arc<LifecycleService<Probe, Clock>>,
    pub health_monitor: Arc<HealthMonitor<Probe, Clock>>,
    pub orphan_cleaner: Arc<OrphanCleaner>,
    pub container_runtime: Arc<dyn ContainerRuntime>,
    orphan_cleanup_interval: std::time::Duration,
}

impl Service {
    /// Builds every component from `config`, choosing the real Docker
    /// adapter or the in-memory fake per `SBX_CONTAINER_RUNTIME` (§10
    /// "Configuration" — the fake lets the daemon run in an environment
    /// with no Docker socket, e.g. local development).
    pub fn build(config: &Config) -> Result<Self, DaemonError> {
        let container_runtime: Arc<dyn ContainerRuntime> = match config.container_runtime_backend.as_str() {
            "fake" => Arc::new(sbx_adapters::FakeContainerRuntime::new()),
            other => {
                if other != "docker" {
                    warn!(backend = other, "unrecognized SBX_CONTAINER_RUNTIME, defaulting to docker");
                }
                Arc::new(
                    BollardContainerRuntime::connect_local()
                        .map_err(|e| DaemonError::ContainerRuntimeConnect(e.to_string()))?,
                )
            }
        };

        let association_store: Arc<dyn AssociationStore> = Arc::new(InMemoryAssociationStore::new());
        let control_factory: Arc<dyn ControlChannelFactory> = Arc::new(WsControlChannelFactory);
        let event_publisher: Arc<dyn EventPublisher> = Arc::new(LoggingEventPublisher);

        let registry = Arc::new(Registry::<Probe>::new(config.port_range_start, config.port_range_width));

        let resource_accounting = Arc::new(ResourceAccounting::<Clock>::new(
            config.max_concurrent_sandboxes,
            config.min_age_for_cleanup,
            config.usage_cache_ttl,
            SystemClock,
        ));

        let lifecycle_config = LifecycleConfig {
            advisory_lock_timeout: config.advisory_lock_timeout,
            max_host_memory_mb: config.max_host_memory_mb,
            max_host_cpu: config.max_host_cpu,
            health_check_interval: config.health_check_interval,
            rebuild_cooldown: config.rebuild_cooldown,
            restart_max_retry_count: config.restart_max_retry_count,
            auto_recover: config.auto_recover,
            projects_root: config.projects_root.clone(),
        };

        let lifecycle = Arc::new(LifecycleService::new(
            registry.clone(),
            association_store.clone(),
            container_runtime.clone(),
            control_factory.clone(),
            event_publisher.clone(),
            resource_accounting.clone(),
            lifecycle_config,
            SystemClock,
        ));

        let health_monitor_config = HealthMonitorConfig {
            health_interval: config.health_interval,
            heartbeat_interval: config.heartbeat_interval,
            ttl_cleanup_interval: config.ttl_cleanup_interval,
            max_recovery_attempts: config.max_recovery_attempts,
            recovery_backoff_base: config.recovery_backoff_base,
            recovery_backoff_cap: config.recovery_backoff_cap,
            auto_recover: config.auto_recover,
            ..HealthMonitorConfig::default()
        };

        let health_monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            container_runtime.clone(),
            control_factory.clone(),
            lifecycle.clone(),
            health_monitor_config,
            SystemClock,
        ));
        let orphan_cleaner = Arc::new(OrphanCleaner::new(
            container_runtime.clone(),
            association_store.clone(),
            config.orphan_grace_period,
            config.orphan_association_checks_enabled,
        ));

        Ok(Self {
            registry,
            lifecycle,
            health_monitor,
            orphan_cleaner,
            container_runtime,
            orphan_cleanup_interval: config.orphan_cleanup_interval,
        })
    }

    /// Runs Startup Sync to completion (§4.7). Callers must gate
    /// request-serving on this returning.
    pub async fn startup_sync(&self) -> Result<StartupSyncStats, DaemonError> {
        let stats = startup_sync(&self.registry, self.container_runtime.as_ref(), &self.lifecycle).await?;
        info!(
            containers_observed = stats.containers_observed,
            instances_registered = stats.instances_registered,
            associations_reconciled = stats.associations_reconciled,
            errors = stats.errors.len(),
            "startup sync complete"
        );
        Ok(stats)
    }

    /// Spawns the Health Monitor's three loops and the Orphan Cleaner's own
    /// loop, returning once `shutdown` is cancelled and every task has
    /// unwound.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let health = self.health_monitor.clone().run(shutdown.clone());
        let orphan = self.clone().run_orphan_loop(shutdown.clone());
        tokio::join!(health, orphan);
    }

    async fn run_orphan_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.orphan_cleanup_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => {
                    let stats = self.orphan_cleaner.run_once().await;
                    if !stats.errors.is_empty() {
                        warn!(errors = ?stats.errors, "orphan cleanup pass encountered errors");
                    }
                    info!(
                        removed_unlabeled_or_stale = stats.removed_unlabeled_or_stale,
                        removed_no_association = stats.removed_no_association,
                        "orphan cleanup pass complete"
                    );
                }
            }
        }
    }
}
