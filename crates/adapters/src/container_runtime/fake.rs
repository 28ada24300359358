// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `ContainerRuntime` for deterministic tests.
//!
//! Lets tests drive scenarios §8 describes (externally-killed container,
//! orphaned container with no association) without a real daemon: callers
//! can reach in and flip a container to `Exited`/`Dead`, or insert a
//! container directly via [`FakeContainerRuntime::inject`] bypassing
//! `create`, to simulate out-of-band state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sbx_core::{Container, ContainerStatus, Labels, ProjectId, SandboxId, TenantId};

use crate::error::AdapterResult;
use crate::ports::{ContainerRuntime, ContainerStats, CreateSpec};

struct FakeEntry {
    container: Container,
}

#[derive(Clone)]
pub struct FakeContainerRuntime {
    containers: Arc<Mutex<HashMap<String, FakeEntry>>>,
    next_id: Arc<AtomicU64>,
    pulled_images: Arc<Mutex<Vec<String>>>,
}

impl Default for FakeContainerRuntime {
    fn default() -> Self {
        Self {
            containers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            pulled_images: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeContainerRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pulled_images(&self) -> Vec<String> {
        self.pulled_images.lock().clone()
    }

    /// Directly inserts a container, bypassing `create`, to simulate one
    /// created out-of-band (§8 scenario 6, orphan cleanup).
    pub fn inject(&self, runtime_id: impl Into<String>, labels: Option<Labels>, status: ContainerStatus) {
        let labels = labels.unwrap_or_else(|| Labels {
            sandbox: true,
            sandbox_id: SandboxId::from_string("sbx-orphan0000000000"),
            project_id: ProjectId::new(""),
            tenant_id: TenantId::new(""),
            created_at: chrono::Utc::now(),
        });
        let runtime_id = runtime_id.into();
        self.containers.lock().insert(
            runtime_id.clone(),
            FakeEntry { container: Container { runtime_id, labels, status, ports: None } },
        );
    }

    /// Test hook: force a container's observed status, simulating an
    /// out-of-band kill (§8 scenario 3).
    pub fn set_status(&self, runtime_id: &str, status: ContainerStatus) {
        if let Some(entry) = self.containers.lock().get_mut(runtime_id) {
            entry.container.status = status;
        }
    }

    pub fn len(&self) -> usize {
        self.containers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContainerRuntime for FakeContainerRuntime {
    async fn pull_image_if_absent(&self, image: &str) -> AdapterResult<()> {
        self.pulled_images.lock().push(image.to_string());
        Ok(())
    }

    async fn create(&self, spec: CreateSpec<'_>) -> AdapterResult<Container> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let runtime_id = format!("fake-{id}");
        let labels = Labels {
            sandbox: true,
            sandbox_id: spec.sandbox_id.clone(),
            project_id: spec
                .labels
                .get("memstack.project_id")
                .map(|s| ProjectId::new(s))
                .unwrap_or_else(|| ProjectId::new("")),
            tenant_id: spec
                .labels
                .get("memstack.tenant_id")
                .map(|s| TenantId::new(s))
                .unwrap_or_else(|| TenantId::new("")),
            created_at: chrono::Utc::now(),
        };
        let container = Container {
            runtime_id: runtime_id.clone(),
            labels,
            status: ContainerStatus::Created,
            ports: Some(spec.ports),
        };
        self.containers.lock().insert(runtime_id, FakeEntry { container: container.clone() });
        Ok(container)
    }

    async fn start(&self, runtime_id: &str) -> AdapterResult<()> {
        if let Some(entry) = self.containers.lock().get_mut(runtime_id) {
            entry.container.status = ContainerStatus::Running;
        }
        Ok(())
    }

    async fn stop(&self, runtime_id: &str, _timeout: Duration) -> AdapterResult<()> {
        if let Some(entry) = self.containers.lock().get_mut(runtime_id) {
            entry.container.status = ContainerStatus::Exited;
        }
        Ok(())
    }

    async fn remove(&self, runtime_id: &str, _force: bool) -> AdapterResult<()> {
        self.containers.lock().remove(runtime_id);
        Ok(())
    }

    async fn get_by_id(&self, runtime_id: &str) -> AdapterResult<Option<Container>> {
        Ok(self.containers.lock().get(runtime_id).map(|e| e.container.clone()))
    }

    async fn get_by_sandbox_id(&self, sandbox_id: &SandboxId) -> AdapterResult<Option<Container>> {
        Ok(self
            .containers
            .lock()
            .values()
            .find(|e| &e.container.labels.sandbox_id == sandbox_id)
            .map(|e| e.container.clone()))
    }

    async fn list_sandbox_containers(
        &self,
        project_id: Option<&ProjectId>,
        tenant_id: Option<&TenantId>,
    ) -> AdapterResult<Vec<Container>> {
        Ok(self
            .containers
            .lock()
            .values()
            .filter(|e| project_id.map(|p| &e.container.labels.project_id == p).unwrap_or(true))
            .filter(|e| tenant_id.map(|t| &e.container.labels.tenant_id == t).unwrap_or(true))
            .map(|e| e.container.clone())
            .collect())
    }

    async fn container_exists(&self, sandbox_id: &SandboxId) -> AdapterResult<bool> {
        Ok(self.get_by_sandbox_id(sandbox_id).await?.is_some())
    }

    async fn is_running(&self, runtime_id: &str) -> AdapterResult<bool> {
        Ok(self
            .containers
            .lock()
            .get(runtime_id)
            .map(|e| e.container.status == ContainerStatus::Running)
            .unwrap_or(false))
    }

    async fn stats(&self, runtime_id: &str) -> AdapterResult<ContainerStats> {
        if self.containers.lock().contains_key(runtime_id) {
            Ok(ContainerStats { cpu_percent: 1.5, mem_mb: 64.0, mem_percent: 3.1 })
        } else {
            Err(crate::error::AdapterError::NotFound(runtime_id.to_string()))
        }
    }

    async fn cleanup_orphans(&self, _grace_period: Duration) -> AdapterResult<u32> {
        let mut containers = self.containers.lock();
        let orphan_ids: Vec<String> = containers
            .iter()
            .filter(|(_, e)| e.container.labels.project_id.as_str().is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &orphan_ids {
            containers.remove(id);
        }
        Ok(orphan_ids.len() as u32)
    }

    async fn exec(&self, runtime_id: &str, command: &[String]) -> AdapterResult<String> {
        if self.containers.lock().contains_key(runtime_id) {
            Ok(format!("ok: {}", command.join(" ")))
        } else {
            Err(crate::error::AdapterError::NotFound(runtime_id.to_string()))
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
