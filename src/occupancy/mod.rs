//! Occupancy Manager
//!
//! Validates check-in/check-out toggles against the current ledger:
//!
//! 1. Mutual exclusion - one member per stand.
//! 2. Seasonal cap - at most `max_places` stands per member.
//! 3. Chain integrity - a member's stands stay one connected component
//!    when the cap is above 1, both when entering and leaving.
//! 4. Daily session limit - while the cap is 1, a member may open only
//!    `daily_session_cap` qualifying sessions per stand per day.
//!
//! The drawing gate sits between the placement rules and the daily limit and
//! is applied by [`crate::engine::Engine`]. A force check bypasses every
//! rule except mutual exclusion.

pub mod chain;
pub mod season;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub use season::{SeasonPolicy, SeasonWindow};

use crate::error::{Rejection, Result};
use crate::ledger::Ledger;
use crate::models::{LocationId, OccupancyEvent, UserId};

/// Raw check request as received from the request layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub location: String,
    pub user: String,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub guest: Option<String>,
}

impl CheckRequest {
    pub fn new(location: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            user: user.into(),
            force: false,
            guest: None,
        }
    }

    /// Attach a free-text guest label
    pub fn with_guest(mut self, guest: impl Into<String>) -> Self {
        let guest = guest.into();
        self.guest = if guest.trim().is_empty() {
            None
        } else {
            Some(guest)
        };
        self
    }

    /// Bypass capacity, chain, turn and daily rules
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Normalize identifiers, rejecting blanks before any storage access
    pub fn identifiers(&self) -> std::result::Result<(LocationId, UserId), Rejection> {
        match (LocationId::parse(&self.location), UserId::parse(&self.user)) {
            (Some(location), Some(user)) => Ok((location, user)),
            _ => Err(Rejection::MissingIdentifier),
        }
    }
}

/// Whether a toggle enters or leaves a stand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    CheckIn,
    CheckOut,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::CheckOut => "check_out",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A toggle that passed the placement rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub location: LocationId,
    pub user: UserId,
    pub direction: Direction,
    /// Seasonal cap in force when the placement was evaluated
    pub max_places: usize,
    pub force: bool,
}

/// Result of a committed toggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub location: LocationId,
    pub user: UserId,
    pub direction: Direction,
}

/// Occupancy rules over the shared ledger
#[derive(Clone)]
pub struct OccupancyManager {
    ledger: Ledger,
    policy: SeasonPolicy,
}

impl OccupancyManager {
    pub fn new(ledger: Ledger, policy: SeasonPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn policy(&self) -> &SeasonPolicy {
        &self.policy
    }

    /// Apply the exclusion, capacity and chain rules
    pub fn evaluate(
        &self,
        location: LocationId,
        user: UserId,
        force: bool,
        now: &DateTime<Local>,
    ) -> Result<Placement> {
        if self.ledger.other_occupant(&location, &user)?.is_some() {
            return Err(Rejection::AlreadyOccupied.into());
        }

        let direction = if self.ledger.is_occupying(&user, &location)? {
            Direction::CheckOut
        } else {
            Direction::CheckIn
        };

        let others = self.ledger.occupied_by(&user, Some(&location))?;
        let max_places = self.policy.max_places(now);

        if !force {
            if direction == Direction::CheckIn && others.len() >= max_places {
                return Err(Rejection::OverCapacity { max_places }.into());
            }

            if max_places > 1 && !others.is_empty() {
                self.check_chain(&location, direction, &others)?;
            }
        }

        Ok(Placement {
            location,
            user,
            direction,
            max_places,
            force,
        })
    }

    fn check_chain(
        &self,
        location: &LocationId,
        direction: Direction,
        others: &[LocationId],
    ) -> Result<()> {
        let store = self.ledger.store();

        let target: Vec<LocationId> = match direction {
            Direction::CheckIn => {
                let mut borders = false;
                for other in others {
                    if store.adjacency_exists(other, location)? {
                        borders = true;
                        break;
                    }
                }
                if !borders {
                    return Err(Rejection::NotBordering.into());
                }

                let mut target = others.to_vec();
                target.push(location.clone());
                target
            }
            Direction::CheckOut => others.to_vec(),
        };

        let connected = chain::is_connected(&others[0], &target, |l| store.adjacent_locations(l))?;
        if !connected {
            return Err(Rejection::ChainBroken.into());
        }

        Ok(())
    }

    /// Apply the daily session limit to a non-forced check-in
    pub fn check_daily_limit(&self, placement: &Placement, now: &DateTime<Local>) -> Result<()> {
        if placement.force
            || placement.direction != Direction::CheckIn
            || !self.policy.is_session_limited(now)
        {
            return Ok(());
        }

        let cap = self.policy.daily_session_cap;
        let sessions = self.ledger.qualifying_sessions(
            &placement.user,
            &placement.location,
            now,
            self.policy.session_cutoff_hour,
        )?;

        if sessions >= cap {
            return Err(Rejection::DailyLimit { cap }.into());
        }

        Ok(())
    }

    /// Append the toggle to the ledger
    pub fn commit(
        &self,
        placement: &Placement,
        guest: Option<String>,
        now: &DateTime<Local>,
    ) -> Result<CheckOutcome> {
        let event = OccupancyEvent::new(placement.location.clone(), placement.user.clone(), guest)
            .at(now.with_timezone(&chrono::Utc));
        self.ledger.record(&event)?;

        tracing::info!(
            user = %placement.user,
            location = %placement.location,
            direction = %placement.direction,
            force = placement.force,
            "Recorded occupancy toggle"
        );

        Ok(CheckOutcome {
            location: placement.location.clone(),
            user: placement.user.clone(),
            direction: placement.direction,
        })
    }
}
