// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::path::Path;

use sbx_core::{PortTriplet, SandboxConfig, SecurityProfile};

use super::*;

fn config() -> SandboxConfig {
    SandboxConfig {
        image: "sandbox:latest".into(),
        memory_limit: "2g".into(),
        cpu_limit: 1.0,
        timeout_seconds: 1800,
        desktop_enabled: true,
        environment: BTreeMap::new(),
        security: SecurityProfile::default(),
    }
}

#[tokio::test]
async fn create_then_start_marks_running() {
    let runtime = FakeContainerRuntime::new();
    let sandbox_id = SandboxId::new();
    let cfg = config();
    let spec = CreateSpec {
        sandbox_id: &sandbox_id,
        project_path: Path::new("/tmp/proj"),
        ports: PortTriplet { mcp: 18765, desktop: 18766, terminal: 18767 },
        config: &cfg,
        labels: BTreeMap::from([
            ("memstack.project_id".into(), "proj-1".into()),
            ("memstack.tenant_id".into(), "ten-1".into()),
        ]),
        env: BTreeMap::new(),
        restart_max_retry_count: 3,
    };
    let container = runtime.create(spec).await.unwrap();
    assert_eq!(container.status, ContainerStatus::Created);

    runtime.start(&container.runtime_id).await.unwrap();
    assert!(runtime.is_running(&container.runtime_id).await.unwrap());
}

#[tokio::test]
async fn get_by_sandbox_id_finds_created_container() {
    let runtime = FakeContainerRuntime::new();
    let sandbox_id = SandboxId::new();
    let cfg = config();
    let spec = CreateSpec {
        sandbox_id: &sandbox_id,
        project_path: Path::new("/tmp/proj"),
        ports: PortTriplet { mcp: 1, desktop: 2, terminal: 3 },
        config: &cfg,
        labels: BTreeMap::new(),
        env: BTreeMap::new(),
        restart_max_retry_count: 1,
    };
    runtime.create(spec).await.unwrap();
    let found = runtime.get_by_sandbox_id(&sandbox_id).await.unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn remove_drops_container() {
    let runtime = FakeContainerRuntime::new();
    let sandbox_id = SandboxId::new();
    let cfg = config();
    let container = runtime
        .create(CreateSpec {
            sandbox_id: &sandbox_id,
            project_path: Path::new("/tmp/proj"),
            ports: PortTriplet { mcp: 1, desktop: 2, terminal: 3 },
            config: &cfg,
            labels: BTreeMap::new(),
            env: BTreeMap::new(),
            restart_max_retry_count: 1,
        })
        .await
        .unwrap();
    runtime.remove(&container.runtime_id, true).await.unwrap();
    assert!(runtime.get_by_id(&container.runtime_id).await.unwrap().is_none());
}

#[tokio::test]
async fn cleanup_orphans_removes_only_unlabeled_containers() {
    let runtime = FakeContainerRuntime::new();
    runtime.inject("orphan-1", None, ContainerStatus::Running);
    let labeled = Labels {
        sandbox: true,
        sandbox_id: SandboxId::new(),
        project_id: ProjectId::new("proj-1"),
        tenant_id: TenantId::new("ten-1"),
        created_at: chrono::Utc::now(),
    };
    runtime.inject("labeled-1", Some(labeled), ContainerStatus::Running);

    let removed = runtime.cleanup_orphans(Duration::from_secs(60)).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(runtime.len(), 1);
}

#[tokio::test]
async fn set_status_simulates_out_of_band_kill() {
    let runtime = FakeContainerRuntime::new();
    let sandbox_id = SandboxId::new();
    let cfg = config();
    let container = runtime
        .create(CreateSpec {
            sandbox_id: &sandbox_id,
            project_path: Path::new("/tmp/proj"),
            ports: PortTriplet { mcp: 1, desktop: 2, terminal: 3 },
            config: &cfg,
            labels: BTreeMap::new(),
            env: BTreeMap::new(),
            restart_max_retry_count: 1,
        })
        .await
        .unwrap();
    runtime.start(&container.runtime_id).await.unwrap();
    runtime.set_status(&container.runtime_id, ContainerStatus::Dead);
    assert!(!runtime.is_running(&container.runtime_id).await.unwrap());
}

#[tokio::test]
async fn stats_errors_for_unknown_container() {
    let runtime = FakeContainerRuntime::new();
    let result = runtime.stats("missing").await;
    assert!(result.is_err());
}
