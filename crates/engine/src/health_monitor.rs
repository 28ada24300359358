// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health Monitor (§4.5): three independent loops — health, heartbeat, TTL
//! cleanup — plus bounded automatic recovery with exponential backoff.
//!
//! Signals recovery through a narrow callback interface rather than calling
//! the Lifecycle Service directly (§9 "Cyclic or back-reference risk"): the
//! [`RecreateHandler`] trait is the one exception, since §4.5 step 5
//! explicitly defers an unrecoverable sandbox to the Lifecycle Service's
//! recreate path, and that can't be expressed as a fire-and-forget callback
//! without losing the ability to await its result.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sbx_adapters::{ContainerRuntime, ControlChannelFactory};
use sbx_core::{Clock, ContainerStatus, HealthCheckLevel, HealthResult, SandboxError, SandboxId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::health::{self, CheckParams};
use crate::port_allocator::PortProbe;
use crate::registry::Registry;
use crate::ttl_cache::{TtlCache, TtlSweepable};

/// Deferred to the Lifecycle Service: "the container is not running" branch
/// of §4.5's automatic recovery algorithm.
#[async_trait]
pub trait RecreateHandler: Send + Sync {
    async fn recreate_sandbox(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEventKind {
    Unhealthy,
    Recovered,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct RecoveryEvent {
    pub sandbox_id: SandboxId,
    pub kind: RecoveryEventKind,
    pub detail: String,
}

pub type RecoveryCallback = Arc<dyn Fn(RecoveryEvent) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct HealthMonitorConfig {
    pub health_interval: Duration,
    pub heartbeat_interval: Duration,
    pub ttl_cleanup_interval: Duration,
    pub default_level: HealthCheckLevel,
    pub basic_timeout: Duration,
    pub heartbeat_timeout: Duration,
    pub call_timeout: Duration,
    pub max_recovery_attempts: u32,
    pub recovery_backoff_base: Duration,
    pub recovery_backoff_cap: Duration,
    pub auto_recover: bool,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(60),
            heartbeat_interval: Duration::from_secs(30),
            ttl_cleanup_interval: Duration::from_secs(300),
            default_level: HealthCheckLevel::Mcp,
            basic_timeout: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(15),
            max_recovery_attempts: 3,
            recovery_backoff_base: Duration::from_secs(5),
            recovery_backoff_cap: Duration::from_secs(60),
            auto_recover: true,
        }
    }
}

pub struct HealthMonitor<P: PortProbe, C: Clock> {
    registry: Arc<Registry<P>>,
    container_runtime: Arc<dyn ContainerRuntime>,
    control_factory: Arc<dyn ControlChannelFactory>,
    recreate_handler: Arc<dyn RecreateHandler>,
    config: HealthMonitorConfig,
    clock: C,
    health_cache: TtlCache<SandboxId, HealthResult, C>,
    recovery_attempts: TtlCache<SandboxId, u32, C>,
    recovering: Mutex<HashSet<SandboxId>>,
    callbacks: Mutex<Vec<RecoveryCallback>>,
    extra_caches: Mutex<Vec<Arc<dyn TtlSweepable>>>,
}

impl<P: PortProbe + 'static, C: Clock + 'static> HealthMonitor<P, C> {
    pub fn new(
        registry: Arc<Registry<P>>,
        container_runtime: Arc<dyn ContainerRuntime>,
        control_factory: Arc<dyn ControlChannelFactory>,
        recreate_handler: Arc<dyn RecreateHandler>,
        config: HealthMonitorConfig,
        clock: C,
    ) -> Self {
        Self {
            registry,
            container_runtime,
            control_factory,
            recreate_handler,
            health_cache: TtlCache::new(config.health_interval.max(Duration::from_secs(10)), 10_000, clock.clone()),
            recovery_attempts: TtlCache::new(Duration::from_secs(3600), 10_000, clock.clone()),
            recovering: Mutex::new(HashSet::new()),
            callbacks: Mutex::new(Vec::new()),
            extra_caches: Mutex::new(Vec::new()),
            config,
            clock,
        }
    }

    pub fn on_event(&self, callback: RecoveryCallback) {
        self.callbacks.lock().push(callback);
    }

    /// Registers an additional TTL cache (e.g. the Lifecycle Service's
    /// rebuild cooldown, or Resource Accounting's usage cache) to be swept
    /// by this monitor's TTL cleanup loop (§4.5).
    pub fn track_cache(&self, cache: Arc<dyn TtlSweepable>) {
        self.extra_caches.lock().push(cache);
    }

    pub fn cached_health(&self, sandbox_id: &SandboxId) -> Option<HealthResult> {
        self.health_cache.get(sandbox_id)
    }

    fn fire(&self, event: RecoveryEvent) {
        for callback in self.callbacks.lock().iter() {
            callback(event.clone());
        }
    }

    /// Runs all three loops until `shutdown` is cancelled. Never returns an
    /// error: failures inside a tick are logged and the loop continues to
    /// its next sleep (§7 "never crash the serving process").
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let health = self.clone().run_health_loop(shutdown.clone());
        let heartbeat = self.clone().run_heartbeat_loop(shutdown.clone());
        let ttl = self.clone().run_ttl_loop(shutdown.clone());
        tokio::join!(health, heartbeat, ttl);
    }

    async fn run_health_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.health_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => self.tick_health().await,
            }
        }
    }

    async fn run_heartbeat_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => self.tick_heartbeat().await,
            }
        }
    }

    async fn run_ttl_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.ttl_cleanup_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => self.tick_ttl_cleanup(),
            }
        }
    }

    /// One health-loop pass: probe every known Instance at the default
    /// level, cache the result, and route unhealthy ones to recovery.
    pub async fn tick_health(&self) {
        let instances = self.registry.all();
        let mut checked = 0usize;
        let mut unhealthy = 0usize;
        for instance in instances {
            checked += 1;
            let existing = self.registry.control_channel(&instance.sandbox_id);
            let params = CheckParams {
                sandbox_id: &instance.sandbox_id,
                endpoint_url: &instance.endpoint_urls.websocket_url,
                desktop_enabled: instance.config.desktop_enabled,
                level: self.config.default_level,
                basic_timeout: self.config.basic_timeout,
                call_timeout: self.config.call_timeout,
            };
            let (result, channel) =
                health::check(params, self.container_runtime.as_ref(), self.control_factory.as_ref(), existing)
                    .await;

            match &channel {
                Some(c) => self.registry.set_control_channel(&instance.sandbox_id, c.clone()),
                None => self.registry.clear_control_channel(&instance.sandbox_id),
            }
            self.health_cache.set(instance.sandbox_id.clone(), result.clone(), None);

            if result.healthy {
                continue;
            }
            unhealthy += 1;
            warn!(
                sandbox_id = %instance.sandbox_id,
                project_id = %instance.project_id,
                status = %format!("{:?}", result.status),
                "sandbox health check failed"
            );
            self.fire(RecoveryEvent {
                sandbox_id: instance.sandbox_id.clone(),
                kind: RecoveryEventKind::Unhealthy,
                detail: result.errors.join("; "),
            });
            if self.config.auto_recover {
                self.handle_unhealthy(instance.sandbox_id.clone()).await;
            }
        }
        debug!(checked, unhealthy, "health loop tick complete");
    }

    /// One heartbeat-loop pass: ping every Instance whose control client is
    /// marked connected (§4.5).
    pub async fn tick_heartbeat(&self) {
        let instances = self.registry.all();
        let mut pinged = 0usize;
        let mut failed = 0usize;
        for instance in instances {
            if !instance.control_connected {
                continue;
            }
            let Some(channel) = self.registry.control_channel(&instance.sandbox_id) else { continue };
            pinged += 1;
            if let Err(err) = channel.ping(self.config.heartbeat_timeout).await {
                failed += 1;
                warn!(sandbox_id = %instance.sandbox_id, error = %err, "heartbeat failed");
                self.registry.clear_control_channel(&instance.sandbox_id);
                self.fire(RecoveryEvent {
                    sandbox_id: instance.sandbox_id.clone(),
                    kind: RecoveryEventKind::Unhealthy,
                    detail: format!("heartbeat failed: {err}"),
                });
                if self.config.auto_recover {
                    self.handle_unhealthy(instance.sandbox_id.clone()).await;
                }
            }
        }
        debug!(pinged, failed, "heartbeat loop tick complete");
    }

    /// Sweeps this monitor's own caches plus any tracked via [`Self::track_cache`].
    pub fn tick_ttl_cleanup(&self) {
        let mut reaped = self.health_cache.cleanup_expired() + self.recovery_attempts.cleanup_expired();
        for cache in self.extra_caches.lock().iter() {
            reaped += cache.cleanup_expired();
        }
        debug!(reaped, "ttl cleanup loop tick complete");
    }

    /// §4.5 automatic recovery: bounded attempts, exponential backoff,
    /// coalesced via the `_recovering` set (P3, §5 ordering guarantees).
    async fn handle_unhealthy(&self, sandbox_id: SandboxId) {
        let attempts = self.recovery_attempts.get(&sandbox_id).unwrap_or(0);
        if attempts >= self.config.max_recovery_attempts {
            error!(sandbox_id = %sandbox_id, attempts, "recovery attempts exhausted, giving up");
            self.fire(RecoveryEvent {
                sandbox_id,
                kind: RecoveryEventKind::Terminated,
                detail: "max recovery attempts exceeded".to_string(),
            });
            return;
        }

        {
            let mut recovering = self.recovering.lock();
            if !recovering.insert(sandbox_id.clone()) {
                debug!(sandbox_id = %sandbox_id, "recovery already in progress, coalescing");
                return;
            }
        }

        let backoff = backoff_for(attempts, self.config.recovery_backoff_base, self.config.recovery_backoff_cap);
        tokio::time::sleep(backoff).await;
        self.recovery_attempts.set(sandbox_id.clone(), attempts + 1, None);

        let outcome = self.attempt_recovery(&sandbox_id).await;
        self.recovering.lock().remove(&sandbox_id);

        match outcome {
            Ok(()) => {
                self.recovery_attempts.delete(&sandbox_id);
                self.fire(RecoveryEvent {
                    sandbox_id,
                    kind: RecoveryEventKind::Recovered,
                    detail: "recovery succeeded".to_string(),
                });
            }
            Err(err) => {
                warn!(sandbox_id = %sandbox_id, error = %err, attempts = attempts + 1, "recovery attempt failed");
            }
        }
    }

    async fn attempt_recovery(&self, sandbox_id: &SandboxId) -> Result<(), SandboxError> {
        let Some(instance) = self.registry.get(sandbox_id) else {
            return Err(SandboxError::SandboxNotFound(sandbox_id.clone()));
        };
        let running = self
            .container_runtime
            .get_by_sandbox_id(sandbox_id)
            .await
            .map_err(SandboxError::from)?
            .map(|c| c.status == ContainerStatus::Running)
            .unwrap_or(false);

        if running {
            // Container survives; only the control channel needs repair.
            match self
                .control_factory
                .connect(sandbox_id, &instance.endpoint_urls.websocket_url, self.config.call_timeout)
                .await
            {
                Ok(channel) => {
                    self.registry.set_control_channel(sandbox_id, channel);
                    Ok(())
                }
                Err(err) => Err(SandboxError::from(err)),
            }
        } else {
            self.recreate_handler.recreate_sandbox(sandbox_id).await
        }
    }

    pub fn epoch_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }
}

fn backoff_for(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    base.checked_mul(multiplier as u32).unwrap_or(cap).min(cap)
}

#[cfg(test)]
#[path = "health_monitor_tests.rs"]
mod tests;
