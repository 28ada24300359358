// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `sandbox_id -> Instance` index with the three-lock hierarchy
//! of §4.3: `port_allocation_lock` (owned by [`PortAllocator`]),
//! `instance_lock` (the map itself), `cleanup_lock` (the in-progress set).
//!
//! Locks are always taken port → instance → cleanup and never nested — the
//! three concerns are disjoint by design, so no call site needs more than
//! one at a time (P5 Lock hygiene).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use sbx_adapters::ControlChannel;
use sbx_core::{AssociationStatus, Instance, PortTriplet, ProjectId, SandboxId};

use crate::port_allocator::{PortAllocator, PortProbe, TcpPortProbe};

pub struct Registry<P: PortProbe = TcpPortProbe> {
    port_allocator: PortAllocator<P>,
    instances: Mutex<HashMap<SandboxId, Instance>>,
    cleanup_in_progress: Mutex<HashSet<SandboxId>>,
    /// Side table for the `control_client?` handle §3 describes on Instance:
    /// kept out of the serializable `Instance` struct itself since a trait
    /// object can't round-trip through serde. Guarded independently of the
    /// three-lock hierarchy (§4.3) — it's a fourth, disjoint concern.
    control_channels: Mutex<HashMap<SandboxId, Arc<dyn ControlChannel>>>,
}

impl Registry<TcpPortProbe> {
    pub fn new(port_range_start: u16, port_range_width: u16) -> Self {
        Self::with_allocator(PortAllocator::new(port_range_start, port_range_width))
    }
}

impl<P: PortProbe> Registry<P> {
    pub fn with_allocator(port_allocator: PortAllocator<P>) -> Self {
        Self {
            port_allocator,
            instances: Mutex::new(HashMap::new()),
            cleanup_in_progress: Mutex::new(HashSet::new()),
            control_channels: Mutex::new(HashMap::new()),
        }
    }

    /// Stores (or replaces) the live control channel for `sandbox_id` and
    /// marks the Instance's `control_connected` flag, if present.
    pub fn set_control_channel(&self, sandbox_id: &SandboxId, channel: Arc<dyn ControlChannel>) {
        self.control_channels.lock().insert(sandbox_id.clone(), channel);
        self.update(sandbox_id, |i| i.control_connected = true);
    }

    pub fn control_channel(&self, sandbox_id: &SandboxId) -> Option<Arc<dyn ControlChannel>> {
        self.control_channels.lock().get(sandbox_id).cloned()
    }

    pub fn clear_control_channel(&self, sandbox_id: &SandboxId) {
        self.control_channels.lock().remove(sandbox_id);
        self.update(sandbox_id, |i| i.control_connected = false);
    }

    pub async fn allocate_ports(&self) -> sbx_core::SandboxResult<PortTriplet> {
        self.port_allocator.allocate().await
    }

    pub fn release_ports(&self, ports: PortTriplet) {
        self.port_allocator.release(ports);
    }

    pub fn insert(&self, instance: Instance) {
        self.instances.lock().insert(instance.sandbox_id.clone(), instance);
    }

    pub fn get(&self, sandbox_id: &SandboxId) -> Option<Instance> {
        self.instances.lock().get(sandbox_id).cloned()
    }

    pub fn find_by_project(&self, project_id: &ProjectId) -> Option<Instance> {
        self.instances.lock().values().find(|i| &i.project_id == project_id).cloned()
    }

    /// Applies `mutate` to the instance in place under the instance lock.
    /// Returns `false` if no such instance exists.
    pub fn update<F: FnOnce(&mut Instance)>(&self, sandbox_id: &SandboxId, mutate: F) -> bool {
        let mut instances = self.instances.lock();
        match instances.get_mut(sandbox_id) {
            Some(instance) => {
                mutate(instance);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, sandbox_id: &SandboxId) -> Option<Instance> {
        self.control_channels.lock().remove(sandbox_id);
        self.instances.lock().remove(sandbox_id)
    }

    /// Snapshot of every known instance, for loops that iterate the whole
    /// Registry (Health Monitor ticks, Orphan Cleaner cross-checks).
    pub fn all(&self) -> Vec<Instance> {
        self.instances.lock().values().cloned().collect()
    }

    /// Count of instances whose status counts toward the concurrency
    /// ceiling (§3 invariant 7, §4.8).
    pub fn count_active(&self) -> usize {
        self.instances
            .lock()
            .values()
            .filter(|i| {
                matches!(
                    i.status,
                    AssociationStatus::Creating | AssociationStatus::Running | AssociationStatus::Unhealthy
                )
            })
            .count()
    }

    /// Marks `sandbox_id` as currently being cleaned up; returns `true` if
    /// this call won the race (§4.3 `cleanup_lock`), `false` if another
    /// caller is already cleaning it up.
    pub fn try_begin_cleanup(&self, sandbox_id: &SandboxId) -> bool {
        self.cleanup_in_progress.lock().insert(sandbox_id.clone())
    }

    pub fn end_cleanup(&self, sandbox_id: &SandboxId) {
        self.cleanup_in_progress.lock().remove(sandbox_id);
    }

    pub fn is_cleanup_in_progress(&self, sandbox_id: &SandboxId) -> bool {
        self.cleanup_in_progress.lock().contains(sandbox_id)
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
