//! Readers and writers sharing one service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use plot_service::{
    BlockPos, FlagPolicy, GridCoord, MembershipAuthorizer, PlotService, WorldConfig, WorldName,
};
use uuid::Uuid;

#[test]
fn test_readers_never_see_partial_merges() {
    let service = Arc::new(PlotService::new(MembershipAuthorizer::new()));
    service.register_world(&WorldConfig::new("plots")).unwrap();
    let world = WorldName::new("plots");
    let owner = Uuid::from_u128(1);

    let home = service.claim(&world, GridCoord::new(0, 0), owner).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let world = world.clone();
            let home = home.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut lookups = 0_u64;
                while !done.load(Ordering::Acquire) {
                    for x in 0..32 {
                        let at = service.plot_at_cell(&world, GridCoord::new(x, 0)).unwrap();
                        // Every claimed cell is either its own plot or merged into home
                        if let Some(id) = at {
                            assert!(id == home || id.home() == GridCoord::new(x, 0));
                        }
                        lookups += 1;
                    }
                    assert!(service.is_consistent(&world).unwrap());
                }
                lookups
            })
        })
        .collect();

    for x in 1..32 {
        let next = service.claim(&world, GridCoord::new(x, 0), owner).unwrap();
        service.merge(owner, &home, &next, FlagPolicy::default()).unwrap();
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    let snapshot = service.snapshot(&home).unwrap();
    assert_eq!(snapshot.region.len(), 32);
    assert_eq!(service.plot_count(&world).unwrap(), 1);
    // Road between cells 3 and 4 lies inside the merged plot
    assert_eq!(
        service.plot_at(&world, BlockPos::new(4 * 49 - 3, 10)).unwrap(),
        Some(home)
    );
}

#[test]
fn test_concurrent_claims_never_double_assign() {
    let service = Arc::new(PlotService::new(MembershipAuthorizer::new()));
    service.register_world(&WorldConfig::new("plots")).unwrap();
    let world = WorldName::new("plots");

    let workers: Vec<_> = (0..8_u128)
        .map(|n| {
            let service = Arc::clone(&service);
            let world = world.clone();
            thread::spawn(move || {
                (0..16)
                    .filter(|&x| service.claim(&world, GridCoord::new(x, 0), Uuid::from_u128(n)).is_ok())
                    .count()
            })
        })
        .collect();

    let won: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert_eq!(won, 16);
    assert_eq!(service.plot_count(&world).unwrap(), 16);
    assert!(service.is_consistent(&world).unwrap());
}
