//! End-to-end plot scenarios through the service.

use std::collections::BTreeSet;

use plot_service::{
    FlagPolicy, GridCoord, MembershipAuthorizer, PlotRegion, PlotService, ServiceConfig,
    ServiceError, TopologyError, WorldName,
};
use uuid::Uuid;

const U: Uuid = Uuid::from_u128(0xA);
const V: Uuid = Uuid::from_u128(0xB);

fn service() -> (PlotService, WorldName) {
    let config = ServiceConfig::from_json_str(r#"{ "worlds": [ { "name": "plots" } ] }"#).unwrap();
    let service = PlotService::from_config(&config, MembershipAuthorizer::new()).unwrap();
    (service, WorldName::new("plots"))
}

fn cell(x: i32, z: i32) -> GridCoord {
    GridCoord::new(x, z)
}

fn cells(list: &[(i32, i32)]) -> PlotRegion {
    list.iter().map(|&(x, z)| cell(x, z)).collect()
}

fn topology_error(err: ServiceError) -> TopologyError {
    match err {
        ServiceError::Topology(err) => err,
        other => panic!("expected topology error, got {other:?}"),
    }
}

// ============================================================================
// Claim / merge / trim
// ============================================================================

#[test]
fn test_claim_merge_trim_round_trip() {
    let (service, world) = service();

    let p1 = service.claim(&world, cell(0, 0), U).unwrap();
    let p2 = service.claim(&world, cell(1, 0), U).unwrap();
    assert_eq!(service.snapshot(&p1).unwrap().region, cells(&[(0, 0)]));
    assert!(service.is_same_owner_mergeable(&p1, &p2));

    service.merge(U, &p1, &p2, FlagPolicy::default()).unwrap();
    assert_eq!(service.snapshot(&p1).unwrap().region, cells(&[(0, 0), (1, 0)]));
    assert_eq!(service.plot_at_cell(&world, cell(1, 0)).unwrap(), Some(p1.clone()));
    assert!(service.snapshot(&p2).is_none());

    service.trim(U, &p1, &cells(&[(1, 0)])).unwrap();
    assert_eq!(service.snapshot(&p1).unwrap().region, cells(&[(0, 0)]));
    assert_eq!(service.plot_at_cell(&world, cell(1, 0)).unwrap(), None);
    assert!(service.is_consistent(&world).unwrap());
}

#[test]
fn test_merge_of_distant_plots_fails() {
    let (service, world) = service();
    let a = service.claim(&world, cell(0, 0), U).unwrap();
    let b = service.claim(&world, cell(2, 0), U).unwrap();

    let err = service.merge(U, &a, &b, FlagPolicy::default()).unwrap_err();
    assert!(matches!(topology_error(err), TopologyError::NotAdjacent { .. }));
    assert!(!service.is_same_owner_mergeable(&a, &b));
    assert_eq!(service.snapshot(&a).unwrap().region, cells(&[(0, 0)]));
    assert_eq!(service.snapshot(&b).unwrap().region, cells(&[(2, 0)]));
}

#[test]
fn test_merge_needs_authorization_on_both_plots() {
    let (service, world) = service();
    let mine = service.claim(&world, cell(0, 0), U).unwrap();
    let theirs = service.claim(&world, cell(0, 1), V).unwrap();

    let err = service.merge(U, &mine, &theirs, FlagPolicy::default()).unwrap_err();
    assert_eq!(
        topology_error(err),
        TopologyError::Unauthorized {
            plot: theirs.clone()
        }
    );

    // Trusted on both, but the owners still differ
    service.add_trusted(V, &theirs, U).unwrap();
    let err = service.merge(U, &mine, &theirs, FlagPolicy::default()).unwrap_err();
    assert_eq!(
        topology_error(err),
        TopologyError::OwnerMismatch {
            a: mine.clone(),
            b: theirs.clone()
        }
    );
    assert_eq!(service.plot_count(&world).unwrap(), 2);
}

#[test]
fn test_failed_trim_is_idempotent() {
    let (service, world) = service();
    let home = service.claim(&world, cell(0, 0), U).unwrap();
    for x in 1..=4 {
        let next = service.claim(&world, cell(x, 0), U).unwrap();
        service.merge(U, &home, &next, FlagPolicy::default()).unwrap();
    }
    let before = service.snapshot(&home).unwrap();

    for _ in 0..5 {
        let err = service.trim(U, &home, &cells(&[(2, 0)])).unwrap_err();
        assert!(matches!(
            topology_error(err),
            TopologyError::WouldDisconnect { components: 2, .. }
        ));
    }

    assert_eq!(service.snapshot(&home).unwrap(), before);
    for x in 0..=4 {
        assert_eq!(service.plot_at_cell(&world, cell(x, 0)).unwrap(), Some(home.clone()));
    }
}

#[test]
fn test_unclaim_then_reclaim() {
    let (service, world) = service();
    let first = service.claim(&world, cell(3, 3), U).unwrap();

    let last = service.unclaim(U, &first).unwrap();
    assert_eq!(last.id, first);
    let err = service.unclaim(U, &first).unwrap_err();
    assert_eq!(topology_error(err), TopologyError::NotFound(first.clone()));

    let second = service.claim(&world, cell(3, 3), V).unwrap();
    assert_ne!(first, second);
    assert_eq!(service.plot_at_cell(&world, cell(3, 3)).unwrap(), Some(second));
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_partition_invariant_over_grid() {
    let (service, world) = service();
    let mut claimed = Vec::new();
    for x in -6..6 {
        for z in -6..6 {
            let owner = if x < 0 { U } else { V };
            claimed.push((cell(x, z), service.claim(&world, cell(x, z), owner).unwrap()));
        }
    }

    for (at, id) in &claimed {
        assert_eq!(service.plot_at_cell(&world, *at).unwrap().as_ref(), Some(id));
    }
    let ids: BTreeSet<_> = claimed.iter().map(|(_, id)| id.clone()).collect();
    assert_eq!(ids.len(), claimed.len());
    assert_eq!(service.plots_owned_by(&world, U).unwrap().len(), 72);
}

#[test]
fn test_neighbors_follow_merges() {
    let (service, world) = service();
    let a = service.claim(&world, cell(0, 0), U).unwrap();
    let b = service.claim(&world, cell(0, 1), U).unwrap();
    let east = service.claim(&world, cell(1, 1), V).unwrap();
    let corner = service.claim(&world, cell(1, 2), V).unwrap();

    assert_eq!(service.neighbors_of(&east).unwrap(), BTreeSet::from([b.clone(), corner.clone()]));

    service.merge(U, &a, &b, FlagPolicy::default()).unwrap();
    assert_eq!(service.neighbors_of(&east).unwrap(), BTreeSet::from([a.clone(), corner]));
    assert_eq!(service.neighbors_of(&a).unwrap(), BTreeSet::from([east]));
    assert!(service.neighbors_of(&b).unwrap().is_empty());
}

#[test]
fn test_swap_and_flags() {
    let (service, world) = service();
    let a = service.claim(&world, cell(0, 0), U).unwrap();
    let b = service.claim(&world, cell(4, 4), U).unwrap();
    service.set_flag(U, &a, "greeting", "hi").unwrap();

    service.swap(U, &a, &b).unwrap();
    assert_eq!(service.plot_at_cell(&world, cell(4, 4)).unwrap(), Some(a.clone()));
    assert_eq!(
        service.snapshot(&a).unwrap().flags.get("greeting").map(String::as_str),
        Some("hi")
    );

    assert_eq!(service.remove_flag(U, &a, "greeting").unwrap(), Some("hi".to_owned()));
    assert_eq!(service.remove_flag(U, &a, "greeting").unwrap(), None);
}
