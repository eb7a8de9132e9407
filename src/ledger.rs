//! Parity projections over the occupancy event log
//!
//! A (user, location) pair is occupied when it has an odd number of events.
//! Every read the engine performs goes through here so the rule lives in
//! exactly one place.

use chrono::{DateTime, Local, Timelike};

use crate::models::{BoardEntry, LocationId, OccupancyEvent, UserId};
use crate::storage::{SharedOccupancyStore, StorageResult};

/// Read/append view of the shared occupancy log
#[derive(Clone)]
pub struct Ledger {
    store: SharedOccupancyStore,
}

impl Ledger {
    pub fn new(store: SharedOccupancyStore) -> Self {
        Self { store }
    }

    /// Underlying store
    pub fn store(&self) -> &SharedOccupancyStore {
        &self.store
    }

    /// Check whether `user` is currently signed in at `location`
    pub fn is_occupying(&self, user: &UserId, location: &LocationId) -> StorageResult<bool> {
        Ok(self.store.event_count(user, location)? % 2 == 1)
    }

    /// The member other than `user` signed in at `location`, if any
    pub fn other_occupant(
        &self,
        location: &LocationId,
        user: &UserId,
    ) -> StorageResult<Option<UserId>> {
        Ok(self
            .store
            .occupants_excluding(location, user)?
            .into_iter()
            .next())
    }

    /// Locations `user` is signed in at, minus `excluding`
    pub fn occupied_by(
        &self,
        user: &UserId,
        excluding: Option<&LocationId>,
    ) -> StorageResult<Vec<LocationId>> {
        self.store.locations_occupied_by(user, excluding)
    }

    /// Sessions `user` started at `location` on the calendar day of `now`
    /// at or after `cutoff_hour`
    ///
    /// Every even-indexed event of the pair opens a session.
    pub fn qualifying_sessions(
        &self,
        user: &UserId,
        location: &LocationId,
        now: &DateTime<Local>,
        cutoff_hour: u32,
    ) -> StorageResult<usize> {
        let today = now.date_naive();
        let sessions = self
            .store
            .event_times(user, location)?
            .into_iter()
            .step_by(2)
            .map(|opened| opened.with_timezone(&Local))
            .filter(|opened| opened.date_naive() == today && opened.hour() >= cutoff_hour)
            .count();
        Ok(sessions)
    }

    /// Current board: every open session
    pub fn board(&self) -> StorageResult<Vec<BoardEntry>> {
        self.store.open_sessions()
    }

    /// Append a toggle
    pub fn record(&self, event: &OccupancyEvent) -> StorageResult<()> {
        self.store.record_event(event)
    }
}
