// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn triplet(base: u16) -> PortTriplet {
    PortTriplet { mcp: base, desktop: base + 1, terminal: base + 2 }
}

#[test]
fn port_triplet_overlap_detects_shared_port() {
    let a = triplet(18765);
    let b = PortTriplet { mcp: 19000, desktop: 18766, terminal: 19002 };
    assert!(a.overlaps(&b));
}

#[test]
fn port_triplet_no_overlap_for_disjoint_ranges() {
    let a = triplet(18765);
    let b = triplet(18900);
    assert!(!a.overlaps(&b));
}

#[test]
fn labels_round_trip_through_map() {
    let labels = Labels {
        sandbox: true,
        sandbox_id: SandboxId::new(),
        project_id: ProjectId::new("proj-1"),
        tenant_id: TenantId::new("ten-1"),
        created_at: Utc::now(),
    };
    let map = labels.as_map();
    let parsed = Labels::from_map(&map).expect("labels should parse back");
    assert_eq!(parsed.sandbox_id, labels.sandbox_id);
    assert_eq!(parsed.project_id, labels.project_id);
    assert_eq!(parsed.tenant_id, labels.tenant_id);
}

#[test]
fn labels_as_map_uses_bit_exact_keys() {
    let labels = Labels {
        sandbox: true,
        sandbox_id: SandboxId::new(),
        project_id: ProjectId::new("proj-1"),
        tenant_id: TenantId::new("ten-1"),
        created_at: Utc::now(),
    };
    let map = labels.as_map();
    for key in [
        "memstack.sandbox",
        "memstack.sandbox.id",
        "memstack.project_id",
        "memstack.tenant_id",
        "memstack.created_at",
    ] {
        assert!(map.contains_key(key), "missing label {key}");
    }
}

#[test]
fn labels_from_map_is_none_without_project_id() {
    let mut map = BTreeMap::new();
    map.insert("memstack.sandbox".to_string(), "true".to_string());
    assert!(Labels::from_map(&map).is_none());
}

#[test]
fn association_status_display_matches_wire_strings() {
    assert_eq!(AssociationStatus::Creating.to_string(), "creating");
    assert_eq!(AssociationStatus::Running.to_string(), "running");
    assert_eq!(AssociationStatus::Unhealthy.to_string(), "unhealthy");
    assert_eq!(AssociationStatus::Stopped.to_string(), "stopped");
    assert_eq!(AssociationStatus::Error.to_string(), "error");
    assert_eq!(AssociationStatus::Terminated.to_string(), "terminated");
}

#[test]
fn only_terminated_is_terminal() {
    assert!(AssociationStatus::Terminated.is_terminal());
    assert!(!AssociationStatus::Running.is_terminal());
    assert!(!AssociationStatus::Error.is_terminal());
}

#[test]
fn health_check_level_display_matches_cli_surface() {
    assert_eq!(HealthCheckLevel::Basic.to_string(), "basic");
    assert_eq!(HealthCheckLevel::Mcp.to_string(), "mcp");
    assert_eq!(HealthCheckLevel::Services.to_string(), "services");
    assert_eq!(HealthCheckLevel::Full.to_string(), "full");
}
