//! Scenario 6: a container created outside the core's API, carrying only
//! the bare `memstack.sandbox` label, is removed; labeled containers with a
//! live Association are left alone.

use crate::prelude::*;
use sbx_adapters::ContainerRuntime;
use sbx_core::ContainerStatus;

#[tokio::test]
async fn unlabeled_container_is_removed_but_associated_ones_survive() {
    let h = harness();
    let proj = project("proj-6");
    let ten = tenant("ten-1");

    let info = h.service.get_or_create(&proj, &ten, None, None).await.unwrap();
    h.runtime.inject("orphan-1", None, ContainerStatus::Running);
    assert_eq!(h.runtime.len(), 2);

    let stats = h.orphan_cleaner.run_once().await;

    assert_eq!(stats.removed_unlabeled_or_stale, 1);
    assert_eq!(h.runtime.len(), 1);
    let remaining = h.runtime.get_by_sandbox_id(&info.sandbox_id).await.unwrap();
    assert!(remaining.is_some(), "the associated container must survive orphan cleanup");
}
