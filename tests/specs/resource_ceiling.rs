//! Scenario 7: a third concurrent `get_or_create` beyond the configured
//! ceiling neither blocks forever nor wedges the host — it queues, and is
//! drained the moment capacity frees up.

use crate::prelude::*;
use sbx_adapters::AssociationStore;
use sbx_core::SandboxError;

#[tokio::test]
async fn queued_creation_is_drained_once_capacity_frees_up() {
    let h = harness_with(HarnessOpts { max_concurrent_sandboxes: 2, ..Default::default() });
    let ten = tenant("ten-1");

    let a = project("proj-7a");
    let b = project("proj-7b");
    let queued = project("proj-7c");

    h.service.get_or_create(&a, &ten, None, None).await.unwrap();
    h.service.get_or_create(&b, &ten, None, None).await.unwrap();

    let err = h.service.get_or_create(&queued, &ten, None, None).await.unwrap_err();
    assert!(matches!(err, SandboxError::Conflict(_)));
    assert!(h.associations.find_by_project(&queued).await.unwrap().is_none());

    h.service.terminate(&a, false).await.unwrap();

    assert!(
        h.associations.find_by_project(&queued).await.unwrap().is_some(),
        "freeing a slot must drain the queued creation automatically"
    );
}
