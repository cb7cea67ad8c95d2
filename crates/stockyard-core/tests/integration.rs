//! End-to-end scenarios for the core router: carriers serving queues,
//! harbors loading ships, snapshots mid-delivery.

use stockyard_core::harbor::{MaterialSource, SourceState};
use stockyard_core::harbors::HarborRegistry;
use stockyard_core::id::*;
use stockyard_core::priority::Priority;
use stockyard_core::request::{MaterialRequest, RequestDefaults};
use stockyard_core::router::{RequestRouter, RouterError};
use stockyard_core::serialize;
use stockyard_core::shared::SharedRouter;
use stockyard_core::test_utils::*;

/// Serve every request of a set with unlimited carriers, one unit per
/// selection. Returns the number of units delivered.
fn deliver_all(router: &mut RequestRouter, set: QueueSetId) -> u32 {
    let mut delivered = 0;
    while let Some(id) = router.select_best(set).unwrap() {
        router.dispatch(id).unwrap();
        router.arrive(id).unwrap();
        delivered += 1;
    }
    delivered
}

#[test]
fn carriers_drain_high_tier_before_low() {
    let (mut router, set) = router_with_set();
    let low = request_at(&mut router, set, pos(0, 0), plank(), 3);
    let high = router
        .register(set, MaterialRequest::new(pos(1, 0), plank(), 2).with_priority(Priority::High))
        .unwrap();

    let mut order = Vec::new();
    while let Some(id) = router.select_best(set).unwrap() {
        router.dispatch(id).unwrap();
        router.arrive(id).unwrap();
        order.push(id);
    }
    assert_eq!(order, vec![high, high, low, low, low]);
    assert!(router.queue_set(set).unwrap().is_empty());
    router.validate().unwrap();
}

#[test]
fn every_unit_is_delivered_exactly_once() {
    let (mut router, set) = router_with_set();
    let ids = fill_tier(&mut router, set, 6, true);
    assert_eq!(deliver_all(&mut router, set), 60);
    for id in ids {
        assert!(router.request(id).is_none());
    }
    assert_eq!(router.request_count(), 0);
    assert!(router.queue_set(set).unwrap().is_empty());
}

#[test]
fn fulfilled_requests_do_not_pile_up() {
    let (mut router, set) = router_with_set();
    for x in 0..50 {
        request_at(&mut router, set, pos(x, 0), plank(), 1);
    }
    assert_eq!(deliver_all(&mut router, set), 50);
    assert_eq!(router.request_count(), 0);
    router.validate().unwrap();
}

#[test]
fn aborted_delivery_reopens_the_need() {
    let (mut router, set) = router_with_set();
    let id = router
        .register(set, MaterialRequest::new(pos(0, 0), stone(), 1).with_in_deliverable_cap(1))
        .unwrap();

    router.dispatch(id).unwrap();
    assert_eq!(router.select_best(set).unwrap(), None);
    router.abort(id).unwrap();
    assert_eq!(router.select_best(set).unwrap(), Some(id));
}

#[test]
fn router_defaults_apply_to_new_requests() {
    let mut router = RequestRouter::with_defaults(RequestDefaults {
        in_deliverable_cap: 1,
        round_robin: true,
    });
    let set = router.create_queue_set();
    let a = router.new_request(pos(0, 0), plank(), 4);
    assert_eq!(a.in_deliverable_cap(), 1);
    assert!(a.is_round_robin());
    let a = router.register(set, a).unwrap();
    let b = router
        .register(set, router.new_request(pos(1, 0), plank(), 4))
        .unwrap();

    assert_eq!(router.select_next(set, Priority::Low).unwrap(), Some(a));
    assert_eq!(router.select_next(set, Priority::Low).unwrap(), Some(b));
    router.dispatch(a).unwrap();
    // `a` is at its cap; only `b` is servable.
    assert_eq!(router.select_next(set, Priority::Low).unwrap(), Some(b));
    assert_eq!(router.select_next(set, Priority::Low).unwrap(), Some(b));
}

#[test]
fn stale_handles_are_errors() {
    let (mut router, set) = router_with_set();
    let id = request_at(&mut router, set, pos(0, 0), plank(), 1);
    router.release(id).unwrap();

    assert_eq!(router.dispatch(id), Err(RouterError::RequestNotFound(id)));
    assert_eq!(router.set_priority(id, Priority::High), Err(RouterError::RequestNotFound(id)));
    router.remove_queue_set(set).unwrap();
    assert_eq!(router.select_best(set), Err(RouterError::QueueSetNotFound(set)));
}

#[test]
fn ship_loads_from_harbors_of_its_owner() {
    let mut router = RequestRouter::new();
    let mut harbors = HarborRegistry::new();

    let mut home = active_harbor(0, pos(10, 10));
    home.add_trade_request(&mut router, fish(), 3, Priority::Low).unwrap();
    home.add_trade_request(&mut router, gold(), 2, Priority::Low).unwrap();
    let home = harbors.insert(home);

    let mut rival = active_harbor(1, pos(50, 10));
    rival.add_trade_request(&mut router, fish(), 9, Priority::Low).unwrap();
    harbors.insert(rival);

    let target = harbors
        .of_player(PlayerId(0))
        .iter()
        .find(|(_, h)| h.needs_servicing(&router))
        .map(|(id, _)| id);
    assert_eq!(target, Some(home));

    let harbor = harbors.get_mut(home).unwrap();
    let mut cargo = Vec::new();
    while let Some(material) = harbor.try_take_single_unit(&mut router) {
        cargo.push(material);
    }
    assert_eq!(cargo, vec![fish(), fish(), fish(), gold(), gold()]);
    assert!(!harbor.needs_servicing(&router));
    // Only the rival's order is left.
    assert_eq!(router.request_count(), 1);
}

#[test]
fn stopped_harbor_keeps_its_orders() {
    let mut router = RequestRouter::new();
    let mut harbor = active_harbor(0, pos(0, 0));
    let order = harbor.add_trade_request(&mut router, fish(), 2, Priority::Low).unwrap();
    harbor.set_priority(Priority::Stopped);

    assert_eq!(harbor.state(), SourceState::Stopped);
    assert_eq!(harbor.try_take_units(&mut router, fish(), 2), 0);
    assert_eq!(router.request(order).unwrap().still_needed(), 2);

    harbor.set_priority(Priority::Low);
    assert_eq!(harbor.try_take_units(&mut router, fish(), 2), 2);
    assert!(router.request(order).is_none());
}

#[test]
fn snapshot_mid_delivery_resumes_cleanly() {
    let (mut router, set) = router_with_set();
    let ids = fill_tier(&mut router, set, 3, true);
    let in_flight = router.select_best(set).unwrap().unwrap();
    router.dispatch(in_flight).unwrap();

    let harbors = HarborRegistry::new();
    let bytes = serialize::serialize(&router, &harbors, 7).unwrap();
    let mut restored = serialize::deserialize(&bytes).unwrap().router;

    restored.arrive(in_flight).unwrap();
    assert_eq!(restored.request(in_flight).unwrap().still_needed(), 9);
    assert_eq!(tier_ids(&restored, set, Priority::Low), vec![ids[1], ids[2], ids[0]]);
    assert_eq!(deliver_all(&mut restored, set), 29);
    restored.validate().unwrap();
}

#[test]
fn shared_router_serves_display_snapshots() {
    let shared = SharedRouter::default();
    let set = shared.write(|r| r.create_queue_set());
    let ids = shared.write(|r| fill_tier(r, set, 3, false));

    shared.write(|r| r.reposition(set, ids[2], 0)).unwrap();
    let snap = shared.snapshot(set).unwrap();
    let order: Vec<_> = snap.tier(Priority::Low).iter().map(|r| r.id).collect();
    assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
}
