//! Core data structures for the stand board
//!
//! Identifiers are newtypes so a location id can never be passed where a
//! user id is expected. Occupancy is never stored as a flag: it is derived
//! from [`OccupancyEvent`] parity by the [`crate::ledger`] layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Normalized member identifier (trimmed, lower-cased)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Normalize a raw name into an identifier
    ///
    /// Returns `None` when nothing is left after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Title-cased name for board display
    pub fn display_name(&self) -> String {
        title_case(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stand identifier such as `"12B"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

impl LocationId {
    /// Parse a raw location id; `None` when blank
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Title-case each space separated word
pub fn title_case(name: &str) -> String {
    name.to_lowercase()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Locations
// ============================================================================

/// A stand on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    /// Normalized (0.0 - 1.0) position of the stand marker on the map image
    pub point: (f64, f64),
    pub map: String,
}

/// Undirected adjacency edge, always stored in canonical order
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Adjacency {
    pub a: LocationId,
    pub b: LocationId,
}

impl Adjacency {
    /// Build the canonical edge for an unordered pair
    ///
    /// Returns `None` for a self-edge.
    pub fn new(x: LocationId, y: LocationId) -> Option<Self> {
        match x.cmp(&y) {
            std::cmp::Ordering::Less => Some(Self { a: x, b: y }),
            std::cmp::Ordering::Greater => Some(Self { a: y, b: x }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// The endpoint opposite `from`, if `from` is on this edge
    pub fn other(&self, from: &LocationId) -> Option<&LocationId> {
        if &self.a == from {
            Some(&self.b)
        } else if &self.b == from {
            Some(&self.a)
        } else {
            None
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Append-only check-in/check-out toggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyEvent {
    pub location: LocationId,
    pub user: UserId,
    pub guest: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OccupancyEvent {
    pub fn new(location: LocationId, user: UserId, guest: Option<String>) -> Self {
        Self {
            location,
            user,
            guest,
            created_at: Utc::now(),
        }
    }

    /// Override the event timestamp
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// One occupied stand as shown on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardEntry {
    pub location: LocationId,
    pub occupant: UserId,
    pub guest: Option<String>,
    pub since: DateTime<Utc>,
}

impl BoardEntry {
    /// Occupant display name, with the guest label appended when present
    pub fn label(&self) -> String {
        match &self.guest {
            Some(guest) => format!("{} (+{guest})", self.occupant.display_name()),
            None => self.occupant.display_name(),
        }
    }
}

// ============================================================================
// Members and Entrants
// ============================================================================

/// Club member record kept by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user: UserId,
    /// Phone number or address for turn notices
    pub contact: Option<String>,
    /// Holder of a priority pass
    pub priority: bool,
}

impl Member {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            contact: None,
            priority: false,
        }
    }

    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = Some(contact.into());
        self
    }

    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }
}

/// Member opted into the upcoming drawing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    pub user: UserId,
    pub contact: Option<String>,
    pub priority: bool,
}

impl From<Member> for Entrant {
    fn from(member: Member) -> Self {
        Self {
            user: member.user,
            contact: member.contact,
            priority: member.priority,
        }
    }
}
