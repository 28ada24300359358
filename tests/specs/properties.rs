//! Property-based invariants (§8): P1 Single-sandbox, P2 Port uniqueness,
//! P6 Idempotent startup sync, P7 Orphan safety.
//!
//! Each case builds a fresh harness and runs on its own `tokio` runtime —
//! `proptest!` bodies are synchronous, so the async lifecycle calls are
//! driven with `block_on` rather than `#[tokio::test]`.

use std::collections::HashSet;

use proptest::prelude::*;

use crate::prelude::*;
use sbx_adapters::{AssociationStore, ContainerRuntime};
use sbx_core::ContainerStatus;

fn rt() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("tokio runtime")
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Create,
    Terminate,
    Recreate,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Create), Just(Action::Terminate), Just(Action::Recreate)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// P1 Single-sandbox: whatever order create/terminate/recreate run in
    /// for one project, at most one non-terminated Association exists for
    /// it at every observation point.
    #[test]
    fn single_sandbox_invariant_holds_across_action_sequences(actions in prop::collection::vec(arb_action(), 1..12)) {
        rt().block_on(async {
            let h = harness();
            let proj = project("proj-p1");
            let ten = tenant("ten-1");

            for action in actions {
                match action {
                    Action::Create => { let _ = h.service.get_or_create(&proj, &ten, None, None).await; }
                    Action::Terminate => { let _ = h.service.terminate(&proj, false).await; }
                    Action::Recreate => {
                        let _ = h.service.get_or_create(&proj, &ten, None, None).await;
                        if let Ok(Some(container)) = h.runtime
                            .get_by_sandbox_id(&h.associations.find_by_project(&proj).await.unwrap().map(|a| a.sandbox_id).unwrap_or_default())
                            .await
                        {
                            h.runtime.set_status(&container.runtime_id, ContainerStatus::Exited);
                        }
                    }
                }

                let non_terminated = h.associations
                    .find_by_project(&proj)
                    .await
                    .unwrap()
                    .into_iter()
                    .filter(|a| !a.status.is_terminal())
                    .count();
                prop_assert!(non_terminated <= 1);
            }
        });
    }

    /// P2 Port uniqueness: across any number of distinct projects created in
    /// one process, no two live Instances share a port.
    #[test]
    fn port_triplets_never_collide_across_projects(project_count in 1usize..8) {
        rt().block_on(async {
            let h = harness();
            let ten = tenant("ten-1");

            for i in 0..project_count {
                let proj = project(&format!("proj-p2-{i}"));
                h.service.get_or_create(&proj, &ten, None, None).await.unwrap();
            }

            let mut seen = HashSet::new();
            for instance in h.registry.all() {
                prop_assert!(seen.insert(instance.ports.mcp));
                prop_assert!(seen.insert(instance.ports.desktop));
                prop_assert!(seen.insert(instance.ports.terminal));
            }
        });
    }

    /// P7 Orphan safety: the cleaner never removes a container whose
    /// `sandbox_id` appears in a non-terminated Association, regardless of
    /// how many unrelated orphans are mixed in.
    #[test]
    fn orphan_cleaner_never_touches_a_live_association(orphan_count in 0usize..5) {
        rt().block_on(async {
            let h = harness();
            let proj = project("proj-p7");
            let ten = tenant("ten-1");

            let info = h.service.get_or_create(&proj, &ten, None, None).await.unwrap();
            for i in 0..orphan_count {
                h.runtime.inject(format!("orphan-{i}"), None, ContainerStatus::Running);
            }

            h.orphan_cleaner.run_once().await;

            let survivor = h.runtime.get_by_sandbox_id(&info.sandbox_id).await.unwrap();
            prop_assert!(survivor.is_some(), "a container backing a live association must survive");
            prop_assert_eq!(h.runtime.len(), 1, "every orphan should have been removed");
        });
    }
}

/// P6 Idempotent startup sync: running it twice in a row against the same
/// ground truth produces byte-identical Registry state. Not a `proptest!`
/// case (startup_sync takes a `&LifecycleService`, which would need to
/// outlive a `Strategy` closure); a fixed small fleet of containers is
/// enough to exercise the idempotence the invariant actually claims.
#[tokio::test]
async fn startup_sync_twice_in_a_row_is_idempotent() {
    let h = harness();
    for i in 0..4 {
        let proj = project(&format!("proj-p6-{i}"));
        h.service.get_or_create(&proj, &tenant("ten-1"), None, None).await.unwrap();
    }

    let first = sbx_engine::startup_sync(&h.registry, h.runtime.as_ref(), &h.service).await.unwrap();
    let mut first_snapshot = h.registry.all();
    first_snapshot.sort_by(|a, b| a.sandbox_id.as_str().cmp(b.sandbox_id.as_str()));

    let second = sbx_engine::startup_sync(&h.registry, h.runtime.as_ref(), &h.service).await.unwrap();
    let mut second_snapshot = h.registry.all();
    second_snapshot.sort_by(|a, b| a.sandbox_id.as_str().cmp(b.sandbox_id.as_str()));

    assert_eq!(first.containers_observed, second.containers_observed);
    assert_eq!(first_snapshot.len(), second_snapshot.len());
    for (a, b) in first_snapshot.iter().zip(second_snapshot.iter()) {
        assert_eq!(a.sandbox_id, b.sandbox_id);
        assert_eq!(a.ports, b.ports);
        assert_eq!(a.status, b.status);
    }
}
