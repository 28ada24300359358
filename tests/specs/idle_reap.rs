//! Scenarios 5 and 8: idle reap, and the minimum-age guard that protects a
//! freshly created sandbox from being reaped just because it looks idle.

use chrono::{Duration as ChronoDuration, Utc};

use crate::prelude::*;
use sbx_adapters::AssociationStore;

#[tokio::test]
async fn idle_sandbox_past_the_threshold_is_reaped() {
    let h = harness_with(HarnessOpts { min_age_for_cleanup: std::time::Duration::from_secs(0), ..Default::default() });
    let proj = project("proj-5");
    let ten = tenant("ten-1");

    let info = h.service.get_or_create(&proj, &ten, None, None).await.unwrap();

    let mut association = h.associations.find_by_project(&proj).await.unwrap().unwrap();
    association.created_at = Utc::now() - ChronoDuration::hours(3);
    association.last_accessed_at = Some(Utc::now() - ChronoDuration::hours(2));
    h.associations.save(association).await.unwrap();

    let reaped = h.service.cleanup_stale(3600, false).await.unwrap();
    assert_eq!(reaped, vec![info.sandbox_id]);
}

#[tokio::test]
async fn recently_created_sandbox_is_protected_by_the_minimum_age_guard() {
    let h = harness_with(HarnessOpts {
        min_age_for_cleanup: std::time::Duration::from_secs(600),
        ..Default::default()
    });
    let proj = project("proj-8");
    let ten = tenant("ten-1");

    h.service.get_or_create(&proj, &ten, None, None).await.unwrap();

    let mut association = h.associations.find_by_project(&proj).await.unwrap().unwrap();
    association.created_at = Utc::now() - ChronoDuration::seconds(120);
    association.last_accessed_at = Some(Utc::now() - ChronoDuration::seconds(90));
    h.associations.save(association).await.unwrap();

    let reaped = h.service.cleanup_stale(60, false).await.unwrap();
    assert!(reaped.is_empty(), "a sandbox younger than min_age_for_cleanup must not be reaped");
}
