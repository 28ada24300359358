//! Scenario 1: cold-state create, then reuse by a second caller.

use crate::prelude::*;
use sbx_core::AssociationStatus;

#[tokio::test]
async fn cold_start_then_reused_by_another_caller() {
    let h = harness();
    let proj = project("proj-1");
    let ten = tenant("ten-1");

    let first = h.service.get_or_create(&proj, &ten, None, None).await.unwrap();
    assert_eq!(first.status, AssociationStatus::Running);
    assert!(first.is_healthy);
    assert!(first.mcp_port.is_some());
    assert!(first.desktop_port.is_some());
    assert!(first.terminal_port.is_some());

    let second = h.service.get_or_create(&proj, &ten, None, None).await.unwrap();
    assert_eq!(first.sandbox_id, second.sandbox_id);
    assert_eq!(h.runtime.len(), 1);
}
