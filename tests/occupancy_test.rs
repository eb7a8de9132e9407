//! Occupancy rules through the engine

mod common;

use chrono::Duration;
use common::*;
use standboard::error::{BoardErrorTrait, Error, ErrorCategory};
use standboard::occupancy::{CheckRequest, Direction};
use standboard::storage::{self, OccupancyStore};
use std::sync::Arc;

async fn toggle(h: &Harness, location: &str, name: &str) -> standboard::error::Result<Direction> {
    h.engine
        .attempt_check(CheckRequest::new(location, name))
        .await
        .map(|o| o.direction)
}

#[tokio::test]
async fn test_double_check_in_toggles_back_out() {
    let h = Harness::new(store_with_edges(&[]), june());
    assert_eq!(toggle(&h, "7B", "pat").await.unwrap(), Direction::CheckIn);
    assert_eq!(toggle(&h, "7B", " PAT ").await.unwrap(), Direction::CheckOut);
    assert!(h.engine.board().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stand_holds_one_member() {
    let h = Harness::new(store_with_edges(&[]), june());
    toggle(&h, "7B", "pat").await.unwrap();

    let result = toggle(&h, "7B", "sam").await;
    assert_eq!(rejection_code(result), "ALREADY_OCCUPIED");

    toggle(&h, "7B", "pat").await.unwrap();
    assert_eq!(toggle(&h, "7B", "sam").await.unwrap(), Direction::CheckIn);
}

#[tokio::test]
async fn test_two_place_season_requires_bordering() {
    let h = Harness::new(store_with_edges(&[("L1", "L2")]), september());
    toggle(&h, "L1", "pat").await.unwrap();

    assert_eq!(rejection_code(toggle(&h, "L3", "pat").await), "NOT_BORDERING");
    assert_eq!(toggle(&h, "L2", "pat").await.unwrap(), Direction::CheckIn);

    // Third stand exceeds the September cap
    let h2 = Harness::new(
        store_with_edges(&[("L1", "L2"), ("L2", "L3")]),
        september(),
    );
    toggle(&h2, "L1", "pat").await.unwrap();
    toggle(&h2, "L2", "pat").await.unwrap();
    assert_eq!(rejection_code(toggle(&h2, "L3", "pat").await), "OVER_CAPACITY");
}

#[tokio::test]
async fn test_check_out_cannot_break_chain() {
    let h = Harness::new(
        store_with_edges(&[("L1", "L2"), ("L2", "L3"), ("L2", "L4")]),
        june(),
    );
    for stand in ["L1", "L2", "L3", "L4"] {
        assert_eq!(toggle(&h, stand, "pat").await.unwrap(), Direction::CheckIn);
    }

    // L1 and L4 only meet through L2
    assert_eq!(rejection_code(toggle(&h, "L2", "pat").await), "CHAIN_BROKEN");
    assert_eq!(toggle(&h, "L3", "pat").await.unwrap(), Direction::CheckOut);

    let held: Vec<_> = h
        .store
        .locations_occupied_by(&user("pat"), None)
        .unwrap()
        .into_iter()
        .map(|l| l.to_string())
        .collect();
    assert_eq!(held, ["L1", "L2", "L4"]);
}

#[tokio::test]
async fn test_single_place_season() {
    let h = Harness::new(store_with_edges(&[("1B", "2B")]), october(8));
    toggle(&h, "1B", "pat").await.unwrap();
    assert_eq!(rejection_code(toggle(&h, "2B", "pat").await), "OVER_CAPACITY");
}

#[tokio::test]
async fn test_daily_session_limit() {
    let h = Harness::new(store_with_edges(&[]), october(13));

    for _ in 0..2 {
        assert_eq!(toggle(&h, "3B", "pat").await.unwrap(), Direction::CheckIn);
        h.clock.advance(Duration::minutes(20));
        assert_eq!(toggle(&h, "3B", "pat").await.unwrap(), Direction::CheckOut);
        h.clock.advance(Duration::minutes(20));
    }

    let third = toggle(&h, "3B", "pat").await;
    assert_eq!(rejection_code(third), "DAILY_LIMIT");

    // Another stand has its own count, and the next day starts fresh
    assert_eq!(toggle(&h, "4B", "pat").await.unwrap(), Direction::CheckIn);
    toggle(&h, "4B", "pat").await.unwrap();
    h.clock.set(local(10, 16, 14));
    assert_eq!(toggle(&h, "3B", "pat").await.unwrap(), Direction::CheckIn);
}

#[tokio::test]
async fn test_morning_sessions_are_not_limited() {
    let h = Harness::new(store_with_edges(&[]), october(6));
    for _ in 0..6 {
        toggle(&h, "3B", "pat").await.unwrap();
        h.clock.advance(Duration::minutes(5));
    }
    h.clock.set(october(14));
    assert_eq!(toggle(&h, "3B", "pat").await.unwrap(), Direction::CheckIn);
}

#[tokio::test]
async fn test_force_bypasses_policy_but_not_exclusion() {
    let h = Harness::new(store_with_edges(&[]), october(13));
    toggle(&h, "1B", "pat").await.unwrap();

    h.engine
        .attempt_check(CheckRequest::new("9B", "pat").forced())
        .await
        .unwrap();
    assert_eq!(
        h.store.locations_occupied_by(&user("pat"), None).unwrap().len(),
        2
    );

    let result = h
        .engine
        .attempt_check(CheckRequest::new("9B", "sam").forced())
        .await;
    assert_eq!(rejection_code(result), "ALREADY_OCCUPIED");
}

#[tokio::test]
async fn test_missing_identifiers_touch_nothing() {
    let h = Harness::new(store_with_edges(&[]), june());
    let result = h.engine.attempt_check(CheckRequest::new("7B", "   ")).await;

    let err = result.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Validation);
    assert_eq!(h.store.event_len(), 0);
}

#[tokio::test]
async fn test_storage_fault_records_nothing() {
    let h = Harness::new(store_with_edges(&[]), june());
    h.store.set_fail_writes(true);

    let err = toggle(&h, "7B", "pat").await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(err.category(), ErrorCategory::Storage);
    assert!(err.rejection().is_none());
    assert_eq!(h.store.event_len(), 0);

    h.store.set_fail_writes(false);
    assert_eq!(toggle(&h, "7B", "pat").await.unwrap(), Direction::CheckIn);
}

#[tokio::test]
async fn test_board_shows_guest_of_opening_event() {
    let h = Harness::new(store_with_edges(&[]), june());
    h.engine
        .attempt_check(CheckRequest::new("12B", "pat doe").with_guest("nephew"))
        .await
        .unwrap();

    let board = h.engine.board().await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].location, loc("12B"));
    assert_eq!(board[0].label(), "Pat Doe (+nephew)");
}

#[tokio::test]
async fn test_sqlite_store_persists_board() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.db");

    {
        let store = storage::create_sqlite_store(&path).unwrap();
        assert_eq!(store.locations().unwrap().len(), 21);
        let engine = standboard::Engine::builder(store)
            .clock(standboard::engine::fixed_clock(june()))
            .build();
        engine.add_adjacency("1B", "2B").await.unwrap();
        engine
            .attempt_check(CheckRequest::new("1B", "pat"))
            .await
            .unwrap();
        engine
            .attempt_check(CheckRequest::new("2B", "pat"))
            .await
            .unwrap();
    }

    let store = storage::create_sqlite_store(&path).unwrap();
    assert_eq!(storage::seed_catalog(store.as_ref()).unwrap(), 0);
    let engine = standboard::Engine::builder(Arc::clone(&store))
        .clock(standboard::engine::fixed_clock(june()))
        .build();

    let board = engine.board().await.unwrap();
    assert_eq!(board.len(), 2);
    assert!(store.adjacency_exists(&loc("2B"), &loc("1B")).unwrap());
}
