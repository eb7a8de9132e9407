//! Drawing lifecycle through the engine

mod common;

use common::*;
use standboard::drawing::DrawPhase;
use standboard::occupancy::{CheckRequest, Direction};
use standboard::engine::{fixed_clock, Engine};
use standboard::storage::{self, OccupancyStore};
use std::time::Duration;

async fn three_entrants(h: &Harness) {
    h.enter("a", Some("555-0001"), true).await;
    h.enter("b", Some("555-0002"), false).await;
    h.enter("c", None, false).await;
}

#[tokio::test(start_paused = true)]
async fn test_priority_entrant_draws_first_and_skips() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;

    let summary = h.engine.start_lottery().await.unwrap();
    assert_eq!(summary.order[0], user("a"));
    assert_eq!(summary.order.len(), 3);

    let status = h.engine.current_status("a").await.unwrap();
    assert_eq!(status.position, Some(0));
    assert!(status.is_running);
    assert_eq!(status.current_index, Some(0));
    assert_eq!(status.phase, DrawPhase::Running);

    tokio::time::sleep(Duration::from_secs(12)).await;
    h.engine.skip_turn("a").await.unwrap();

    let next = summary.order[1].to_string();
    let status = h.engine.current_status(&next).await.unwrap();
    assert_eq!(status.position, Some(1));
    assert_eq!(status.current_index, Some(1));
    assert_eq!(status.seconds_remaining, Some(30));
}

#[tokio::test(start_paused = true)]
async fn test_start_persists_order_and_consumes_entrants() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;

    let summary = h.engine.start_lottery().await.unwrap();

    let recorded = h.store.last_entrant_order().unwrap().unwrap();
    assert_eq!(recorded.draw_id, summary.draw_id);
    assert_eq!(recorded.order, summary.order);
    assert!(h.store.entrants().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_turn_position_is_persisted() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;
    let summary = h.engine.start_lottery().await.unwrap();

    let position = || h.store.last_entrant_order().unwrap().unwrap().current_position;
    assert_eq!(position(), Some(0));

    h.engine.skip_turn("a").await.unwrap();
    assert_eq!(position(), Some(1));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(position(), Some(2));
    let recorded = h.store.last_entrant_order().unwrap().unwrap();
    assert_eq!(recorded.turn_holder(), Some(&summary.order[2]));
    assert!(recorded.finished_at.is_none());

    h.engine.advance_turn().await;
    let recorded = h.store.last_entrant_order().unwrap().unwrap();
    assert!(recorded.finished_at.is_some());
    assert_eq!(recorded.turn_holder(), None);
}

#[tokio::test(start_paused = true)]
async fn test_failed_order_write_keeps_entrants() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;

    h.store.set_fail_writes(true);
    assert!(h.engine.start_lottery().await.is_none());
    h.store.set_fail_writes(false);

    assert!(h.store.last_entrant_order().unwrap().is_none());
    assert_eq!(h.store.entrants().unwrap().len(), 3);
    assert!(!h.engine.is_drawing().await);

    // Nothing was left locked
    let summary = h.engine.start_lottery().await.unwrap();
    assert_eq!(summary.order.len(), 3);
}

#[tokio::test]
async fn test_sqlite_order_and_clear_commit_together() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.db");
    let store = storage::create_sqlite_store(&path).unwrap();
    let engine = Engine::builder(store.clone())
        .clock(fixed_clock(june()))
        .build();
    engine.toggle_entry("ann").await.unwrap();
    engine.toggle_entry("bob").await.unwrap();

    // Make the entrant clear fail after the order rows are written
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER keep_entrants BEFORE DELETE ON entrants
             BEGIN SELECT RAISE(ABORT, 'entrants are read-only'); END;",
        )
        .unwrap();

    assert!(engine.start_lottery().await.is_none());
    assert!(engine.last_order().await.unwrap().is_none());
    assert_eq!(engine.entrants().await.unwrap().len(), 2);
    assert!(!engine.is_drawing().await);
}

#[tokio::test(start_paused = true)]
async fn test_advancing_through_every_entrant_returns_to_idle() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;
    h.engine.start_lottery().await.unwrap();

    for _ in 0..3 {
        assert!(h.engine.is_drawing().await);
        h.engine.advance_turn().await;
    }

    let status = h.engine.current_status("a").await.unwrap();
    assert!(!status.is_running);
    assert_eq!(status.current_index, None);
    assert_eq!(status.position, None);
    assert_eq!(status.seconds_remaining, None);
    assert_eq!(status.phase, DrawPhase::Idle);
    assert!(h.engine.entrants().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_turn_passes_on_timeout() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;
    h.engine.start_lottery().await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(
        h.engine.current_status("a").await.unwrap().current_index,
        Some(1)
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!h.engine.is_drawing().await);
}

#[tokio::test(start_paused = true)]
async fn test_skip_replaces_pending_timer() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;
    let summary = h.engine.start_lottery().await.unwrap();

    tokio::time::sleep(Duration::from_secs(20)).await;
    h.engine.skip_turn("a").await.unwrap();

    // The first turn's timer would have fired at 30s
    tokio::time::sleep(Duration::from_secs(15)).await;
    let status = h.engine.current_status("a").await.unwrap();
    assert_eq!(status.current_index, Some(1));
    assert_eq!(status.seconds_remaining, Some(15));

    tokio::time::sleep(Duration::from_secs(16)).await;
    let third = summary.order[2].to_string();
    assert_eq!(
        h.engine.current_status(&third).await.unwrap().current_index,
        Some(2)
    );
}

#[tokio::test(start_paused = true)]
async fn test_only_turn_holder_may_check_in() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;
    let summary = h.engine.start_lottery().await.unwrap();
    let waiting = summary.order[1].to_string();

    let result = h
        .engine
        .attempt_check(CheckRequest::new("5B", waiting.as_str()))
        .await;
    assert_eq!(rejection_code(result), "NOT_YOUR_TURN");

    let result = h.engine.attempt_check(CheckRequest::new("5B", "zed")).await;
    assert_eq!(rejection_code(result), "NOT_YOUR_TURN");

    assert_eq!(rejection_code(h.engine.skip_turn(&waiting).await), "NOT_YOUR_TURN");

    let outcome = h
        .engine
        .attempt_check(CheckRequest::new("5B", "a"))
        .await
        .unwrap();
    assert_eq!(outcome.direction, Direction::CheckIn);

    // Leaving is never turn-bound
    let outcome = h
        .engine
        .attempt_check(CheckRequest::new("5B", "a"))
        .await
        .unwrap();
    assert_eq!(outcome.direction, Direction::CheckOut);
}

#[tokio::test(start_paused = true)]
async fn test_reaching_cap_passes_turn() {
    let h = Harness::new(store_with_edges(&[]), october(16));
    three_entrants(&h).await;
    h.engine.start_lottery().await.unwrap();

    h.engine
        .attempt_check(CheckRequest::new("5B", "a"))
        .await
        .unwrap();

    let status = h.engine.current_status("a").await.unwrap();
    assert_eq!(status.current_index, Some(1));
    assert_eq!(status.seconds_remaining, Some(30));
}

#[tokio::test(start_paused = true)]
async fn test_start_evicts_everyone() {
    let h = Harness::new(store_with_edges(&[("1B", "2B")]), june());
    h.engine
        .attempt_check(CheckRequest::new("1B", "zed"))
        .await
        .unwrap();
    h.engine
        .attempt_check(CheckRequest::new("2B", "zed"))
        .await
        .unwrap();
    h.engine
        .attempt_check(CheckRequest::new("9B", "yan"))
        .await
        .unwrap();
    three_entrants(&h).await;

    let summary = h.engine.start_lottery().await.unwrap();
    assert_eq!(summary.evicted, 3);
    assert!(h.engine.board().await.unwrap().is_empty());
    assert_eq!(h.store.event_len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_ignored_while_running() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;
    let first = h.engine.start_lottery().await.unwrap();

    assert!(h.engine.start_lottery().await.is_none());
    assert_eq!(
        h.store.last_entrant_order().unwrap().unwrap().draw_id,
        first.draw_id
    );
}

#[tokio::test(start_paused = true)]
async fn test_entries_during_drawing_wait_for_next_one() {
    let h = Harness::new(store_with_edges(&[]), june());
    h.enter("a", None, false).await;
    h.engine.start_lottery().await.unwrap();

    assert!(h.engine.toggle_entry("late").await.unwrap().entered);
    let status = h.engine.current_status("late").await.unwrap();
    assert_eq!(status.position, None);
    assert!(status.entered);
    assert_eq!(status.phase, DrawPhase::Running);

    h.engine.advance_turn().await;
    let status = h.engine.current_status("late").await.unwrap();
    assert_eq!(status.phase, DrawPhase::EntrantsOpen);
    assert_eq!(h.engine.entrants().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_turn_and_on_deck_notices() {
    let h = Harness::new(store_with_edges(&[]), june());
    three_entrants(&h).await;
    let summary = h.engine.start_lottery().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    let sent = h.notifier.sent();
    assert_eq!(sent[0].contact, "555-0001");
    assert!(sent[0].message.contains("your turn"));

    // b is on deck only when b drew second
    if summary.order[1] == user("b") {
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].contact, "555-0002");
        assert!(sent[1].message.contains("on deck"));
    } else {
        assert_eq!(sent.len(), 1);
    }
}

#[tokio::test]
async fn test_skip_without_drawing() {
    let h = Harness::new(store_with_edges(&[]), june());
    assert_eq!(rejection_code(h.engine.skip_turn("a").await), "DRAW_NOT_HAPPENING");
    assert_eq!(rejection_code(h.engine.skip_turn("").await), "MISSING_IDENTIFIER");
}
