// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host-wide concurrency ceiling, pending-creation queue, and per-instance
//! usage cache (§4.8, supplemental). Never mutates the Association Store
//! or the Sandbox Registry — a read side-car the Lifecycle Service
//! consults before creating and after reclaiming capacity.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use sbx_core::{PendingCreation, ProjectId, ResourceUsage, SandboxId};

use crate::port_allocator::PortProbe;
use crate::registry::Registry;
use crate::ttl_cache::TtlCache;
use sbx_core::Clock;

pub struct ResourceAccounting<C: Clock> {
    max_concurrent_sandboxes: usize,
    min_age_for_cleanup: Duration,
    queue: Mutex<VecDeque<PendingCreation>>,
    usage_cache: TtlCache<SandboxId, ResourceUsage, C>,
}

impl<C: Clock> ResourceAccounting<C> {
    pub fn new(
        max_concurrent_sandboxes: usize,
        min_age_for_cleanup: Duration,
        usage_cache_ttl: Duration,
        clock: C,
    ) -> Self {
        Self {
            max_concurrent_sandboxes,
            min_age_for_cleanup,
            queue: Mutex::new(VecDeque::new()),
            usage_cache: TtlCache::new(usage_cache_ttl, 10_000, clock),
        }
    }

    pub fn active_count<P: PortProbe>(&self, registry: &Registry<P>) -> usize {
        registry.count_active()
    }

    pub fn can_create<P: PortProbe>(&self, registry: &Registry<P>) -> bool {
        self.active_count(registry) < self.max_concurrent_sandboxes
    }

    /// Enqueues `request` unless a creation for the same `project_id` is
    /// already pending. Returns `false` for a deduped duplicate so callers
    /// don't report a second "queued" outcome for one retried caller — a
    /// second create_new for the same project while the first is still
    /// queued would otherwise mint two sandbox_ids for it once a slot frees
    /// (P1 single-sandbox invariant).
    pub fn queue(&self, request: PendingCreation) -> bool {
        let mut queue = self.queue.lock();
        if queue.iter().any(|pending| pending.project_id == request.project_id) {
            return false;
        }
        queue.push_back(request);
        true
    }

    pub fn is_queued(&self, project_id: &ProjectId) -> bool {
        self.queue.lock().iter().any(|pending| &pending.project_id == project_id)
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Pops as many queued requests as there are free slots right now.
    /// Callers create each popped request's sandbox one at a time (each
    /// creation counts against the ceiling as it lands), so this never
    /// over-commits even though the whole batch is popped up front.
    pub fn drain_ready<P: PortProbe>(&self, registry: &Registry<P>) -> Vec<PendingCreation> {
        let available = self.max_concurrent_sandboxes.saturating_sub(self.active_count(registry));
        let mut queue = self.queue.lock();
        let mut drained = Vec::with_capacity(available);
        for _ in 0..available {
            match queue.pop_front() {
                Some(request) => drained.push(request),
                None => break,
            }
        }
        drained
    }

    pub fn record_usage(&self, sandbox_id: SandboxId, usage: ResourceUsage) {
        self.usage_cache.set(sandbox_id, usage, None);
    }

    pub fn usage(&self, sandbox_id: &SandboxId) -> Option<ResourceUsage> {
        self.usage_cache.get(sandbox_id)
    }

    pub fn cleanup_expired_usage(&self) -> usize {
        self.usage_cache.cleanup_expired()
    }

    pub fn min_age_for_cleanup(&self) -> Duration {
        self.min_age_for_cleanup
    }
}

#[cfg(test)]
#[path = "resource_accounting_tests.rs"]
mod tests;
