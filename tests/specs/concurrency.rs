//! Scenario 2: 20 concurrent callers for the same project converge on one
//! sandbox and one `sandbox_created` event.

use std::collections::HashSet;

use crate::prelude::*;

#[tokio::test]
async fn concurrent_callers_converge_on_one_sandbox() {
    let h = harness();
    let proj = project("proj-2");
    let ten = tenant("ten-1");

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = h.service.clone();
        let proj = proj.clone();
        let ten = ten.clone();
        handles.push(tokio::spawn(async move { service.get_or_create(&proj, &ten, None, None).await }));
    }

    let mut sandbox_ids = HashSet::new();
    for handle in handles {
        sandbox_ids.insert(handle.await.unwrap().unwrap().sandbox_id);
    }

    assert_eq!(sandbox_ids.len(), 1, "every caller must observe the same sandbox_id");
    assert_eq!(h.runtime.len(), 1, "exactly one container should have been created");
}
