//! In-memory implementation of [`OccupancyStore`]
//!
//! Useful for testing without database dependencies. Writes can be made to
//! fail on demand to exercise fault handling.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::repository::{OccupancyStore, RecordedOrder};
use super::{StorageError, StorageResult};
use crate::models::{
    Adjacency, BoardEntry, Entrant, Location, LocationId, Member, OccupancyEvent, UserId,
};

#[derive(Default)]
struct State {
    locations: Vec<Location>,
    edges: BTreeSet<Adjacency>,
    events: Vec<OccupancyEvent>,
    members: HashMap<UserId, Member>,
    entrants: Vec<UserId>,
    orders: Vec<RecordedOrder>,
}

impl State {
    fn pair_counts(&self) -> BTreeMap<(&LocationId, &UserId), usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry((&event.location, &event.user)).or_insert(0) += 1;
        }
        counts
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryOccupancyStore {
    state: RwLock<State>,
    fail_writes: AtomicBool,
}

impl MemoryOccupancyStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StorageError::Unavailable`]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of recorded events
    pub fn event_len(&self) -> usize {
        self.read().map(|s| s.events.len()).unwrap_or(0)
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| StorageError::Poisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, State>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "writes disabled for testing".to_string(),
            ));
        }
        self.state.write().map_err(|_| StorageError::Poisoned)
    }
}

impl OccupancyStore for MemoryOccupancyStore {
    fn locations(&self) -> StorageResult<Vec<Location>> {
        Ok(self.read()?.locations.clone())
    }

    fn upsert_location(&self, location: &Location) -> StorageResult<()> {
        let mut state = self.write()?;
        match state.locations.iter_mut().find(|l| l.id == location.id) {
            Some(existing) => *existing = location.clone(),
            None => state.locations.push(location.clone()),
        }
        Ok(())
    }

    fn add_adjacency(&self, edge: &Adjacency) -> StorageResult<()> {
        self.write()?.edges.insert(edge.clone());
        Ok(())
    }

    fn adjacency_exists(&self, a: &LocationId, b: &LocationId) -> StorageResult<bool> {
        let Some(edge) = Adjacency::new(a.clone(), b.clone()) else {
            return Ok(false);
        };
        Ok(self.read()?.edges.contains(&edge))
    }

    fn adjacent_locations(&self, location: &LocationId) -> StorageResult<Vec<LocationId>> {
        let state = self.read()?;
        let neighbors: BTreeSet<LocationId> = state
            .edges
            .iter()
            .filter_map(|edge| edge.other(location).cloned())
            .collect();
        Ok(neighbors.into_iter().collect())
    }

    fn record_event(&self, event: &OccupancyEvent) -> StorageResult<()> {
        self.write()?.events.push(event.clone());
        Ok(())
    }

    fn event_count(&self, user: &UserId, location: &LocationId) -> StorageResult<usize> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|e| &e.user == user && &e.location == location)
            .count())
    }

    fn occupants_excluding(
        &self,
        location: &LocationId,
        excluding: &UserId,
    ) -> StorageResult<Vec<UserId>> {
        let state = self.read()?;
        Ok(state
            .pair_counts()
            .into_iter()
            .filter(|((l, u), count)| *l == location && *u != excluding && count % 2 == 1)
            .map(|((_, u), _)| u.clone())
            .collect())
    }

    fn locations_occupied_by(
        &self,
        user: &UserId,
        excluding: Option<&LocationId>,
    ) -> StorageResult<Vec<LocationId>> {
        let state = self.read()?;
        Ok(state
            .pair_counts()
            .into_iter()
            .filter(|((l, u), count)| *u == user && Some(*l) != excluding && count % 2 == 1)
            .map(|((l, _), _)| l.clone())
            .collect())
    }

    fn event_times(
        &self,
        user: &UserId,
        location: &LocationId,
    ) -> StorageResult<Vec<DateTime<Utc>>> {
        Ok(self
            .read()?
            .events
            .iter()
            .filter(|e| &e.user == user && &e.location == location)
            .map(|e| e.created_at)
            .collect())
    }

    fn open_sessions(&self) -> StorageResult<Vec<BoardEntry>> {
        let state = self.read()?;
        let counts = state.pair_counts();

        Ok(counts
            .into_iter()
            .filter(|(_, count)| count % 2 == 1)
            .filter_map(|((location, user), _)| {
                state
                    .events
                    .iter()
                    .rev()
                    .find(|e| &e.location == location && &e.user == user)
                    .map(|opening| BoardEntry {
                        location: opening.location.clone(),
                        occupant: opening.user.clone(),
                        guest: opening.guest.clone(),
                        since: opening.created_at,
                    })
            })
            .collect())
    }

    fn upsert_member(&self, member: &Member) -> StorageResult<()> {
        self.write()?
            .members
            .insert(member.user.clone(), member.clone());
        Ok(())
    }

    fn member(&self, user: &UserId) -> StorageResult<Option<Member>> {
        Ok(self.read()?.members.get(user).cloned())
    }

    fn entrants(&self) -> StorageResult<Vec<Entrant>> {
        let state = self.read()?;
        Ok(state
            .entrants
            .iter()
            .map(|user| match state.members.get(user) {
                Some(member) => Entrant::from(member.clone()),
                None => Entrant::from(Member::new(user.clone())),
            })
            .collect())
    }

    fn is_entrant(&self, user: &UserId) -> StorageResult<bool> {
        Ok(self.read()?.entrants.contains(user))
    }

    fn add_entrant(&self, user: &UserId) -> StorageResult<()> {
        let mut state = self.write()?;
        if !state.entrants.contains(user) {
            state.entrants.push(user.clone());
        }
        Ok(())
    }

    fn remove_entrant(&self, user: &UserId) -> StorageResult<()> {
        self.write()?.entrants.retain(|u| u != user);
        Ok(())
    }

    fn consume_entrants_into_order(
        &self,
        draw_id: &Uuid,
        order: &[UserId],
    ) -> StorageResult<()> {
        let mut state = self.write()?;
        if state.orders.iter().any(|o| &o.draw_id == draw_id) {
            return Err(StorageError::Corrupt(format!("duplicate draw id {draw_id}")));
        }

        state.orders.push(RecordedOrder {
            draw_id: *draw_id,
            order: order.to_vec(),
            created_at: Utc::now(),
            current_position: None,
            finished_at: None,
        });
        state.entrants.clear();
        Ok(())
    }

    fn record_draw_position(
        &self,
        draw_id: &Uuid,
        position: Option<usize>,
    ) -> StorageResult<()> {
        let mut state = self.write()?;
        let Some(order) = state.orders.iter_mut().find(|o| &o.draw_id == draw_id) else {
            return Err(StorageError::Corrupt(format!("unknown draw id {draw_id}")));
        };

        match position {
            Some(index) => order.current_position = Some(index),
            None => order.finished_at = Some(Utc::now()),
        }
        Ok(())
    }

    fn last_entrant_order(&self) -> StorageResult<Option<RecordedOrder>> {
        Ok(self.read()?.orders.last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_writes_blocks_events() {
        let store = MemoryOccupancyStore::new();
        store.set_fail_writes(true);

        let event = OccupancyEvent::new(
            LocationId::parse("1B").unwrap(),
            UserId::parse("ann").unwrap(),
            None,
        );
        assert!(matches!(
            store.record_event(&event),
            Err(StorageError::Unavailable(_))
        ));
        assert_eq!(store.event_len(), 0);

        store.set_fail_writes(false);
        store.record_event(&event).unwrap();
        assert_eq!(store.event_len(), 1);
    }

    #[test]
    fn test_failed_consume_keeps_entrants() {
        let store = MemoryOccupancyStore::new();
        let ann = UserId::parse("ann").unwrap();
        store.add_entrant(&ann).unwrap();

        store.set_fail_writes(true);
        assert!(store
            .consume_entrants_into_order(&Uuid::new_v4(), &[ann.clone()])
            .is_err());
        store.set_fail_writes(false);

        assert!(store.last_entrant_order().unwrap().is_none());
        assert!(store.is_entrant(&ann).unwrap());
    }
}
