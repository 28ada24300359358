// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan Cleaner (§4.7): removes containers lacking a live, non-terminated
//! Association. Runs on its own interval, independent of the Health
//! Monitor's three loops.
//!
//! Criteria (a) missing `memstack.project_id` label and (b) stuck in
//! `exited|dead|created` past a grace period are delegated to the adapter's
//! own [`ContainerRuntime::cleanup_orphans`] (the only party that can see a
//! container's raw labels before they're parsed into a typed `Labels`).
//! Criterion (c) — a labeled container whose `sandbox_id` has no
//! non-terminated Association — requires cross-referencing the Association
//! Store, which the adapter layer has no visibility into, so this module
//! does that part itself (P7 Orphan safety).

use std::sync::Arc;
use std::time::Duration;

use sbx_adapters::{AssociationStore, ContainerRuntime};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct OrphanCleanerStats {
    /// Removed by the adapter for lacking a project label or sitting past
    /// the grace period in a non-running state.
    pub removed_unlabeled_or_stale: u32,
    /// Removed by this component for having no non-terminated Association.
    pub removed_no_association: u32,
    pub errors: Vec<String>,
}

pub struct OrphanCleaner {
    container_runtime: Arc<dyn ContainerRuntime>,
    association_store: Arc<dyn AssociationStore>,
    grace_period: Duration,
    /// Criterion (c) is a full Association Store scan per container; some
    /// deployments disable it to avoid the extra round trips (§4.7 "when DB
    /// checks are enabled").
    association_checks_enabled: bool,
}

impl OrphanCleaner {
    pub fn new(
        container_runtime: Arc<dyn ContainerRuntime>,
        association_store: Arc<dyn AssociationStore>,
        grace_period: Duration,
        association_checks_enabled: bool,
    ) -> Self {
        Self { container_runtime, association_store, grace_period, association_checks_enabled }
    }

    /// One cleanup pass. Never returns an error: every failure is recorded
    /// in the returned stats and logged, matching the other background
    /// loops' "never crash the serving process" contract (§7).
    pub async fn run_once(&self) -> OrphanCleanerStats {
        let mut stats = OrphanCleanerStats::default();

        match self.container_runtime.cleanup_orphans(self.grace_period).await {
            Ok(removed) => stats.removed_unlabeled_or_stale = removed,
            Err(err) => {
                warn!(error = %err, "adapter-level orphan cleanup failed");
                stats.errors.push(err.to_string());
            }
        }

        if self.association_checks_enabled {
            self.cleanup_unassociated(&mut stats).await;
        }

        debug!(
            removed_unlabeled_or_stale = stats.removed_unlabeled_or_stale,
            removed_no_association = stats.removed_no_association,
            errors = stats.errors.len(),
            "orphan cleaner pass complete"
        );
        stats
    }

    async fn cleanup_unassociated(&self, stats: &mut OrphanCleanerStats) {
        let containers = match self.container_runtime.list_sandbox_containers(None, None).await {
            Ok(containers) => containers,
            Err(err) => {
                warn!(error = %err, "failed to list containers for association check");
                stats.errors.push(err.to_string());
                return;
            }
        };

        for container in containers {
            let association = match self.association_store.find_by_sandbox(&container.labels.sandbox_id).await {
                Ok(association) => association,
                Err(err) => {
                    warn!(sandbox_id = %container.labels.sandbox_id, error = %err, "association lookup failed");
                    stats.errors.push(err.to_string());
                    continue;
                }
            };

            // P7: never remove a container whose sandbox_id appears in any
            // non-terminated Association, whether or not one was found here.
            let has_live_association = association.map(|a| !a.status.is_terminal()).unwrap_or(false);
            if has_live_association {
                continue;
            }

            if let Err(err) = self.container_runtime.remove(&container.runtime_id, true).await {
                warn!(sandbox_id = %container.labels.sandbox_id, error = %err, "failed to remove unassociated container");
                stats.errors.push(err.to_string());
                continue;
            }
            stats.removed_no_association += 1;
        }
    }
}

#[cfg(test)]
#[path = "orphan_cleaner_tests.rs"]
mod tests;
