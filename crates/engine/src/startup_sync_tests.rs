// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use sbx_adapters::{
    AssociationStore, ContainerRuntime, CreateSpec, FakeContainerRuntime,
    FakeControlChannelFactory, InMemoryAssociationStore,
};
use sbx_core::{
    Association, AssociationStatus, FakeClock, Labels, PortTriplet, ProjectId, ResourceProfile,
    SandboxConfig, SandboxId, SandboxOverrides, TenantId,
};

use super::*;
use crate::port_allocator::{AlwaysAvailableProbe, PortAllocator};
use crate::registry::Registry;
use crate::resource_accounting::ResourceAccounting;

fn registry() -> Arc<Registry<AlwaysAvailableProbe>> {
    Arc::new(Registry::with_allocator(PortAllocator::with_probe(19765, 300, AlwaysAvailableProbe)))
}

fn config() -> SandboxConfig {
    ResourceProfile::Standard.resolve("memstack/sandbox:latest", &SandboxOverrides::default())
}

async fn create_running_container(
    runtime: &FakeContainerRuntime,
    sandbox_id: &SandboxId,
    project_id: &ProjectId,
    tenant_id: &TenantId,
    ports: PortTriplet,
) -> String {
    let cfg = config();
    let labels = Labels {
        sandbox: true,
        sandbox_id: sandbox_id.clone(),
        project_id: project_id.clone(),
        tenant_id: tenant_id.clone(),
        created_at: chrono::Utc::now(),
    };
    let spec = CreateSpec {
        sandbox_id,
        project_path: std::path::Path::new("/tmp/proj"),
        ports,
        config: &cfg,
        labels: labels.as_map(),
        env: Default::default(),
        restart_max_retry_count: 3,
    };
    let container = runtime.create(spec).await.unwrap();
    runtime.start(&container.runtime_id).await.unwrap();
    container.runtime_id
}

fn lifecycle_service(
    registry: Arc<Registry<AlwaysAvailableProbe>>,
    association_store: Arc<dyn AssociationStore>,
    container_runtime: Arc<dyn ContainerRuntime>,
    clock: FakeClock,
) -> LifecycleService<AlwaysAvailableProbe, FakeClock> {
    let resource_accounting =
        Arc::new(ResourceAccounting::new(64, Duration::from_secs(5), Duration::from_secs(30), clock.clone()));
    LifecycleService::new(
        registry,
        association_store,
        container_runtime,
        Arc::new(FakeControlChannelFactory::new()),
        Arc::new(sbx_adapters::FakeEventPublisher::new()),
        resource_accounting,
        LifecycleConfig::default(),
        clock,
    )
}

fn fixture_association(sandbox_id: &SandboxId, project_id: &ProjectId, tenant_id: &TenantId) -> Association {
    Association {
        id: sbx_core::AssociationId::new(),
        tenant_id: tenant_id.clone(),
        project_id: project_id.clone(),
        sandbox_id: sandbox_id.clone(),
        status: AssociationStatus::Creating,
        error_message: None,
        created_at: chrono::Utc::now(),
        started_at: None,
        last_accessed_at: None,
        last_health_check_at: None,
    }
}

#[tokio::test]
async fn rebuilds_instances_from_labeled_containers() {
    let registry = registry();
    let runtime = Arc::new(FakeContainerRuntime::new());
    let association_store = Arc::new(InMemoryAssociationStore::new());
    let clock = FakeClock::new();

    let sandbox_id = SandboxId::new();
    let project_id = ProjectId::new("proj-startup-1");
    let tenant_id = TenantId::new("tenant-a");
    let ports = PortTriplet { mcp: 19765, desktop: 19766, terminal: 19767 };
    create_running_container(&runtime, &sandbox_id, &project_id, &tenant_id, ports).await;

    association_store
        .save(fixture_association(&sandbox_id, &project_id, &tenant_id))
        .await
        .unwrap();

    let lifecycle = lifecycle_service(
        registry.clone(),
        association_store.clone() as Arc<dyn AssociationStore>,
        runtime.clone() as Arc<dyn ContainerRuntime>,
        clock,
    );

    let stats = startup_sync(&registry, runtime.as_ref(), &lifecycle).await.unwrap();

    assert_eq!(stats.containers_observed, 1);
    assert_eq!(stats.instances_registered, 1);
    assert_eq!(stats.associations_reconciled, 1);
    assert!(stats.errors.is_empty());

    let instance = registry.get(&sandbox_id).expect("instance rebuilt from container");
    assert_eq!(instance.ports, ports);
    assert_eq!(instance.project_id, project_id);

    let association = association_store.find_by_project(&project_id).await.unwrap().unwrap();
    assert_eq!(association.status, AssociationStatus::Running);
}

#[tokio::test]
async fn running_twice_is_idempotent() {
    let registry = registry();
    let runtime = Arc::new(FakeContainerRuntime::new());
    let association_store = Arc::new(InMemoryAssociationStore::new());
    let clock = FakeClock::new();

    let sandbox_id = SandboxId::new();
    let project_id = ProjectId::new("proj-startup-2");
    let tenant_id = TenantId::new("tenant-a");
    let ports = PortTriplet { mcp: 19865, desktop: 19866, terminal: 19867 };
    create_running_container(&runtime, &sandbox_id, &project_id, &tenant_id, ports).await;
    association_store
        .save(fixture_association(&sandbox_id, &project_id, &tenant_id))
        .await
        .unwrap();

    let lifecycle = lifecycle_service(
        registry.clone(),
        association_store.clone() as Arc<dyn AssociationStore>,
        runtime.clone() as Arc<dyn ContainerRuntime>,
        clock,
    );

    let first = startup_sync(&registry, runtime.as_ref(), &lifecycle).await.unwrap();
    let second = startup_sync(&registry, runtime.as_ref(), &lifecycle).await.unwrap();

    assert_eq!(first.instances_registered, second.instances_registered);
    assert_eq!(registry.count_active(), 1);
    let association = association_store.find_by_project(&project_id).await.unwrap().unwrap();
    assert_eq!(association.status, AssociationStatus::Running);
}

#[tokio::test]
async fn skips_instance_rebuild_when_ports_not_yet_published() {
    let registry = registry();
    let runtime = Arc::new(FakeContainerRuntime::new());
    let association_store = Arc::new(InMemoryAssociationStore::new());
    let clock = FakeClock::new();

    let sandbox_id = SandboxId::new();
    let project_id = ProjectId::new("proj-startup-3");
    let tenant_id = TenantId::new("tenant-a");
    let labels = Labels {
        sandbox: true,
        sandbox_id: sandbox_id.clone(),
        project_id: project_id.clone(),
        tenant_id: tenant_id.clone(),
        created_at: chrono::Utc::now(),
    };
    runtime.inject("fake-no-ports", Some(labels), sbx_core::ContainerStatus::Created);

    let lifecycle = lifecycle_service(
        registry.clone(),
        association_store.clone() as Arc<dyn AssociationStore>,
        runtime.clone() as Arc<dyn ContainerRuntime>,
        clock,
    );

    let stats = startup_sync(&registry, runtime.as_ref(), &lifecycle).await.unwrap();

    assert_eq!(stats.containers_observed, 1);
    assert_eq!(stats.instances_registered, 0);
    assert!(registry.get(&sandbox_id).is_none());
}
