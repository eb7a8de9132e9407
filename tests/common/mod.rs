//! Common test utilities

#![allow(dead_code)]

use chrono::{DateTime, Duration, Local, TimeZone};
use std::sync::{Arc, Mutex};

use standboard::drawing::DrawingSettings;
use standboard::engine::{Clock, Engine};
use standboard::error::Result;
use standboard::models::{Adjacency, LocationId, Member, UserId};
use standboard::notifications::MemoryNotifier;
use standboard::storage::{MemoryOccupancyStore, OccupancyStore};

pub fn loc(id: &str) -> LocationId {
    LocationId::parse(id).unwrap()
}

pub fn user(name: &str) -> UserId {
    UserId::parse(name).unwrap()
}

/// Local time on a fixed day of 2024
pub fn local(month: u32, day: u32, hour: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, month, day, hour, 0, 0)
        .earliest()
        .unwrap()
}

/// June: cap 4
pub fn june() -> DateTime<Local> {
    local(6, 15, 9)
}

/// September: cap 2
pub fn september() -> DateTime<Local> {
    local(9, 15, 9)
}

/// October: cap 1, daily session limit applies
pub fn october(hour: u32) -> DateTime<Local> {
    local(10, 15, hour)
}

/// Clock the test can move
#[derive(Clone)]
pub struct TestClock {
    now: Arc<Mutex<DateTime<Local>>>,
}

impl TestClock {
    pub fn new(at: DateTime<Local>) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    pub fn set(&self, at: DateTime<Local>) {
        *self.now.lock().unwrap() = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock().unwrap())
    }
}

/// Store with the given undirected edges
pub fn store_with_edges(edges: &[(&str, &str)]) -> Arc<MemoryOccupancyStore> {
    let store = Arc::new(MemoryOccupancyStore::new());
    for (a, b) in edges {
        store
            .add_adjacency(&Adjacency::new(loc(a), loc(b)).unwrap())
            .unwrap();
    }
    store
}

/// Everything a test needs to drive one engine
pub struct Harness {
    pub engine: Engine,
    pub store: Arc<MemoryOccupancyStore>,
    pub notifier: Arc<MemoryNotifier>,
    pub clock: TestClock,
}

impl Harness {
    pub fn new(store: Arc<MemoryOccupancyStore>, at: DateTime<Local>) -> Self {
        let notifier = Arc::new(MemoryNotifier::new());
        let clock = TestClock::new(at);
        let engine = Engine::builder(store.clone())
            .settings(DrawingSettings {
                seed: Some(2024),
                ..Default::default()
            })
            .notifier(notifier.clone())
            .clock(clock.clock())
            .build();

        Self {
            engine,
            store,
            notifier,
            clock,
        }
    }

    /// Register a member and enter them in the next drawing
    pub async fn enter(&self, name: &str, contact: Option<&str>, priority: bool) {
        let mut member = Member::new(user(name)).with_priority(priority);
        if let Some(contact) = contact {
            member = member.with_contact(contact);
        }
        self.engine.upsert_member(&member).await.unwrap();
        assert!(self.engine.toggle_entry(name).await.unwrap().entered);
    }
}

/// Rejection code of a failed result
pub fn rejection_code<T: std::fmt::Debug>(result: Result<T>) -> &'static str {
    match result {
        Ok(value) => panic!("expected a rejection, got {value:?}"),
        Err(err) => match err.rejection() {
            Some(reason) => reason.code(),
            None => panic!("expected a rejection, got {err}"),
        },
    }
}
