//! Scenarios 3 and 4: externally killed containers and recovery.
//!
//! The exact bounded-attempts-then-`error` timing (scenario 4's
//! `base*(1+2+4)` backoff) needs a recreate handler that can be told to
//! keep failing; `sbx-engine`'s own test suite covers that with a handler
//! built for exactly that purpose. This black-box layer exercises the same
//! recovery path through the real `LifecycleService`, where a killed
//! container recovers successfully rather than being driven to exhaustion.

use crate::prelude::*;
use sbx_adapters::{AssociationStore, ContainerRuntime};
use sbx_core::{AssociationStatus, LifecycleEventType};

#[tokio::test]
async fn externally_killed_container_is_recreated_on_next_call() {
    let h = harness();
    let proj = project("proj-3");
    let ten = tenant("ten-1");

    let first = h.service.ensure_running(&proj, &ten).await.unwrap();

    let container = h.runtime.get_by_sandbox_id(&first.sandbox_id).await.unwrap().unwrap();
    h.runtime.remove(&container.runtime_id, true).await.unwrap();
    assert!(h.runtime.is_empty());

    let second = h.service.ensure_running(&proj, &ten).await.unwrap();
    assert_ne!(first.sandbox_id, second.sandbox_id, "a new sandbox should replace the killed one");
    assert_eq!(second.status, AssociationStatus::Running);
    assert_eq!(h.runtime.len(), 1);

    // Scenario 3: ensure_running must emit sandbox_terminated for the
    // killed sandbox before sandbox_created for its replacement.
    let types: Vec<_> = h.events.events().into_iter().map(|e| e.event_type).collect();
    let terminated_at = types.iter().position(|t| *t == LifecycleEventType::SandboxTerminated);
    let created_at = types.iter().rposition(|t| *t == LifecycleEventType::SandboxCreated);
    assert!(
        matches!((terminated_at, created_at), (Some(t), Some(c)) if t < c),
        "expected sandbox_terminated before the replacement's sandbox_created, got {types:?}"
    );
}

#[tokio::test]
async fn health_loop_recovers_a_container_that_exited_in_place() {
    use sbx_core::ContainerStatus;

    let h = harness();
    let proj = project("proj-4");
    let ten = tenant("ten-1");

    let info = h.service.get_or_create(&proj, &ten, None, None).await.unwrap();
    let container = h.runtime.get_by_sandbox_id(&info.sandbox_id).await.unwrap().unwrap();
    h.runtime.set_status(&container.runtime_id, ContainerStatus::Exited);

    h.monitor.tick_health().await;

    // The Health Monitor's auto-recovery path recreated the sandbox through
    // the real LifecycleService; a fresh, running container now exists.
    let association = h.associations.find_by_project(&proj).await.unwrap().unwrap();
    assert_eq!(association.status, AssociationStatus::Running);
    assert_ne!(association.sandbox_id, info.sandbox_id);
}
