//! Repository trait for the occupancy ledger
//!
//! The trait speaks in events, members and entrants. It never answers
//! "is this stand occupied?" with a stored flag: every occupancy question
//! is a parity query over the append-only event log.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │           Engine (occupancy rules + drawing turns)          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Ledger (parity projections)                 │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     OccupancyStore                          │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//!        ┌─────────────────┐            ┌─────────────────┐
//!        │     SQLite      │            │    In-memory    │
//!        └─────────────────┘            └─────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StorageResult;
use crate::models::{
    Adjacency, BoardEntry, Entrant, Location, LocationId, Member, OccupancyEvent, UserId,
};

/// Audit record of one drawing's entrant order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedOrder {
    pub draw_id: Uuid,
    pub order: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    /// Index of the entrant holding the turn, last time it moved
    pub current_position: Option<usize>,
    /// Set once the pointer ran past the last entrant
    pub finished_at: Option<DateTime<Utc>>,
}

impl RecordedOrder {
    /// Entrant holding the turn when the record was last written
    pub fn turn_holder(&self) -> Option<&UserId> {
        if self.finished_at.is_some() {
            return None;
        }
        self.current_position.and_then(|i| self.order.get(i))
    }
}

/// Storage operations consumed by the engine
pub trait OccupancyStore: Send + Sync {
    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// All known locations
    fn locations(&self) -> StorageResult<Vec<Location>>;

    /// Insert or replace a location
    fn upsert_location(&self, location: &Location) -> StorageResult<()>;

    /// Store an undirected edge (idempotent)
    fn add_adjacency(&self, edge: &Adjacency) -> StorageResult<()>;

    /// Check whether two locations share an edge
    fn adjacency_exists(&self, a: &LocationId, b: &LocationId) -> StorageResult<bool>;

    /// Locations sharing an edge with `location`
    fn adjacent_locations(&self, location: &LocationId) -> StorageResult<Vec<LocationId>>;

    // ------------------------------------------------------------------
    // Event log
    // ------------------------------------------------------------------

    /// Append an occupancy toggle
    fn record_event(&self, event: &OccupancyEvent) -> StorageResult<()>;

    /// Number of events ever recorded for a (user, location) pair
    fn event_count(&self, user: &UserId, location: &LocationId) -> StorageResult<usize>;

    /// Users other than `excluding` with an odd event count at `location`
    fn occupants_excluding(
        &self,
        location: &LocationId,
        excluding: &UserId,
    ) -> StorageResult<Vec<UserId>>;

    /// Locations where `user` has an odd event count, minus `excluding`
    fn locations_occupied_by(
        &self,
        user: &UserId,
        excluding: Option<&LocationId>,
    ) -> StorageResult<Vec<LocationId>>;

    /// Timestamps of every event for a (user, location) pair, oldest first
    fn event_times(&self, user: &UserId, location: &LocationId)
        -> StorageResult<Vec<DateTime<Utc>>>;

    /// Every open session, described by the event that opened it
    fn open_sessions(&self) -> StorageResult<Vec<BoardEntry>>;

    // ------------------------------------------------------------------
    // Members and entrants
    // ------------------------------------------------------------------

    /// Insert or replace a member record
    fn upsert_member(&self, member: &Member) -> StorageResult<()>;

    /// Look up a member record
    fn member(&self, user: &UserId) -> StorageResult<Option<Member>>;

    /// Opted-in entrants in opt-in order, joined with member data
    fn entrants(&self) -> StorageResult<Vec<Entrant>>;

    /// Check whether `user` is opted in
    fn is_entrant(&self, user: &UserId) -> StorageResult<bool>;

    /// Opt `user` in (idempotent)
    fn add_entrant(&self, user: &UserId) -> StorageResult<()>;

    /// Opt `user` out (idempotent)
    fn remove_entrant(&self, user: &UserId) -> StorageResult<()>;

    /// Persist a drawing order for audit and empty the entrant list
    ///
    /// Both happen or neither does.
    fn consume_entrants_into_order(&self, draw_id: &Uuid, order: &[UserId])
        -> StorageResult<()>;

    /// Record the turn index of a drawing; `None` marks it finished
    fn record_draw_position(&self, draw_id: &Uuid, position: Option<usize>)
        -> StorageResult<()>;

    /// Most recently persisted drawing order
    fn last_entrant_order(&self) -> StorageResult<Option<RecordedOrder>>;
}
