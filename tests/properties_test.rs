//! Ledger invariants under random check sequences

mod common;

use common::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use standboard::models::{LocationId, UserId};
use standboard::occupancy::CheckRequest;
use standboard::storage::OccupancyStore;

const STANDS: [&str; 6] = ["L1", "L2", "L3", "L4", "L5", "L6"];
const MEMBERS: [&str; 3] = ["ann", "bob", "cal"];

// L1-L2-L3-L4 path with L5 hanging off L2; L6 is isolated
const EDGES: [(&str, &str); 4] = [("L1", "L2"), ("L2", "L3"), ("L3", "L4"), ("L2", "L5")];

#[derive(Debug, Clone)]
struct Op {
    stand: usize,
    member: usize,
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        (0..STANDS.len(), 0..MEMBERS.len()).prop_map(|(stand, member)| Op { stand, member }),
        1..60,
    )
}

fn held(h: &Harness, name: &str) -> Vec<LocationId> {
    h.store.locations_occupied_by(&user(name), None).unwrap()
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Union-find over `EDGES` restricted to `places`
fn one_component(places: &[LocationId]) -> bool {
    let index: BTreeMap<&str, usize> = places
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let mut parent: Vec<usize> = (0..places.len()).collect();

    for (a, b) in EDGES {
        if let (Some(&x), Some(&y)) = (index.get(a), index.get(b)) {
            let (rx, ry) = (find(&mut parent, x), find(&mut parent, y));
            parent[rx] = ry;
        }
    }

    let roots: BTreeSet<usize> = (0..places.len()).map(|i| find(&mut parent, i)).collect();
    roots.len() <= 1
}

#[test]
fn test_union_find_oracle() {
    let ids = |names: &[&str]| names.iter().map(|n| loc(n)).collect::<Vec<_>>();
    assert!(one_component(&ids(&[])));
    assert!(one_component(&ids(&["L6"])));
    assert!(one_component(&ids(&["L1", "L2", "L5"])));
    assert!(!one_component(&ids(&["L1", "L3"])));
    assert!(!one_component(&ids(&["L4", "L6"])));
}

/// Run `ops`, checking every invariant after each successful toggle
fn run(at: chrono::DateTime<chrono::Local>, ops: &[Op]) -> Result<(), TestCaseError> {
    let h = Harness::new(store_with_edges(&EDGES), at);
    let cap = h.engine.policy().max_places(&at);
    let mut counts: BTreeMap<(UserId, LocationId), usize> = BTreeMap::new();

    for op in ops {
        let request = CheckRequest::new(STANDS[op.stand], MEMBERS[op.member]);
        let result = tokio_test::block_on(h.engine.attempt_check(request));
        if result.is_ok() {
            *counts
                .entry((user(MEMBERS[op.member]), loc(STANDS[op.stand])))
                .or_default() += 1;
        }

        // Occupancy is exactly event-count parity
        for name in MEMBERS {
            let expected: Vec<LocationId> = counts
                .iter()
                .filter(|((u, _), count)| u.as_str() == name && *count % 2 == 1)
                .map(|((_, l), _)| l.clone())
                .collect();
            prop_assert_eq!(held(&h, name), expected);
        }

        // One occupant per stand
        let board = tokio_test::block_on(h.engine.board()).unwrap();
        let stands: BTreeSet<_> = board.iter().map(|e| e.location.clone()).collect();
        prop_assert_eq!(stands.len(), board.len());

        for name in MEMBERS {
            let places = held(&h, name);
            prop_assert!(places.len() <= cap);

            prop_assert!(
                one_component(&places),
                "{} holds a broken chain {:?}",
                name,
                places
            );
        }
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_single_place_season(ops in ops()) {
        run(october(8), &ops)?;
    }

    #[test]
    fn prop_two_place_season(ops in ops()) {
        run(september(), &ops)?;
    }

    #[test]
    fn prop_four_place_season(ops in ops()) {
        run(june(), &ops)?;
    }
}
