// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use sbx_adapters::{AssociationStore, FakeContainerRuntime, InMemoryAssociationStore};
use sbx_core::{Association, AssociationStatus, ContainerStatus, Labels, ProjectId, SandboxId, TenantId};

use super::*;

fn labels(sandbox_id: &SandboxId, project_id: &str, tenant_id: &str) -> Labels {
    Labels {
        sandbox: true,
        sandbox_id: sandbox_id.clone(),
        project_id: ProjectId::new(project_id),
        tenant_id: TenantId::new(tenant_id),
        created_at: chrono::Utc::now(),
    }
}

fn fixture_association(sandbox_id: &SandboxId, project_id: &str, tenant_id: &str, status: AssociationStatus) -> Association {
    Association {
        id: sbx_core::AssociationId::new(),
        tenant_id: TenantId::new(tenant_id),
        project_id: ProjectId::new(project_id),
        sandbox_id: sandbox_id.clone(),
        status,
        error_message: None,
        created_at: chrono::Utc::now(),
        started_at: None,
        last_accessed_at: None,
        last_health_check_at: None,
    }
}

#[tokio::test]
async fn delegates_unlabeled_and_stale_cleanup_to_the_adapter() {
    let runtime = Arc::new(FakeContainerRuntime::new());
    let association_store = Arc::new(InMemoryAssociationStore::new());
    let orphan = SandboxId::new();
    // empty project_id label is what FakeContainerRuntime::cleanup_orphans treats as unlabeled.
    runtime.inject("fake-unlabeled", Some(labels(&orphan, "", "tenant-a")), ContainerStatus::Exited);

    let cleaner = OrphanCleaner::new(runtime.clone(), association_store, Duration::from_secs(60), false);
    let stats = cleaner.run_once().await;

    assert_eq!(stats.removed_unlabeled_or_stale, 1);
    assert_eq!(stats.removed_no_association, 0);
    assert!(runtime.is_empty());
}

#[tokio::test]
async fn removes_labeled_container_with_no_association() {
    let runtime = Arc::new(FakeContainerRuntime::new());
    let association_store = Arc::new(InMemoryAssociationStore::new());
    let sandbox_id = SandboxId::new();
    runtime.inject("fake-no-assoc", Some(labels(&sandbox_id, "proj-1", "tenant-a")), ContainerStatus::Running);

    let cleaner = OrphanCleaner::new(runtime.clone(), association_store, Duration::from_secs(60), true);
    let stats = cleaner.run_once().await;

    assert_eq!(stats.removed_no_association, 1);
    assert!(runtime.is_empty());
}

#[tokio::test]
async fn removes_container_whose_association_is_terminated() {
    let runtime = Arc::new(FakeContainerRuntime::new());
    let association_store = Arc::new(InMemoryAssociationStore::new());
    let sandbox_id = SandboxId::new();
    runtime.inject("fake-terminated", Some(labels(&sandbox_id, "proj-2", "tenant-a")), ContainerStatus::Running);
    association_store
        .save(fixture_association(&sandbox_id, "proj-2", "tenant-a", AssociationStatus::Terminated))
        .await
        .unwrap();

    let cleaner = OrphanCleaner::new(runtime.clone(), association_store, Duration::from_secs(60), true);
    let stats = cleaner.run_once().await;

    assert_eq!(stats.removed_no_association, 1);
    assert!(runtime.is_empty());
}

#[tokio::test]
async fn never_removes_container_with_a_live_association() {
    let runtime = Arc::new(FakeContainerRuntime::new());
    let association_store = Arc::new(InMemoryAssociationStore::new());
    let sandbox_id = SandboxId::new();
    runtime.inject("fake-live", Some(labels(&sandbox_id, "proj-3", "tenant-a")), ContainerStatus::Running);
    association_store
        .save(fixture_association(&sandbox_id, "proj-3", "tenant-a", AssociationStatus::Running))
        .await
        .unwrap();

    let cleaner = OrphanCleaner::new(runtime.clone(), association_store, Duration::from_secs(60), true);
    let stats = cleaner.run_once().await;

    assert_eq!(stats.removed_no_association, 0);
    assert_eq!(stats.errors.len(), 0);
    assert_eq!(runtime.len(), 1);
}

#[tokio::test]
async fn association_checks_disabled_skips_the_association_store_pass() {
    let runtime = Arc::new(FakeContainerRuntime::new());
    let association_store = Arc::new(InMemoryAssociationStore::new());
    let sandbox_id = SandboxId::new();
    runtime.inject("fake-skip", Some(labels(&sandbox_id, "proj-4", "tenant-a")), ContainerStatus::Running);

    let cleaner = OrphanCleaner::new(runtime.clone(), association_store, Duration::from_secs(60), false);
    let stats = cleaner.run_once().await;

    assert_eq!(stats.removed_no_association, 0);
    assert_eq!(runtime.len(), 1);
}
