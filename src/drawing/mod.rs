//! Drawing Scheduler
//!
//! Once a day the board clears and opted-in members take timed turns
//! claiming stands.
//!
//! # Lifecycle
//!
//! ```text
//!  IDLE ──enter──▶ ENTRANTS_OPEN ──start──▶ LOCKED ──▶ RUNNING
//!   ▲                                                    │
//!   └──────────────── order exhausted ───────────────────┘
//! ```
//!
//! While `LOCKED` the board is swept clean, entrants are ordered
//! priority-first and the order is persisted. `RUNNING` gives each entrant
//! `turn_secs` to check in; the turn passes on timeout, on skip, or once the
//! entrant holds as many stands as the season allows.

pub mod order;
pub mod state;
pub mod trigger;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use order::{draw_order, drawing_rng};
pub use state::{DrawPhase, DrawingState};
pub use trigger::DrawTrigger;

/// Drawing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingSettings {
    /// Daily start time, local "HH:MM"
    pub start_time: String,

    /// Seconds each entrant gets per turn
    pub turn_secs: u64,

    /// Delay before the next entrant gets the "on deck" notice
    pub on_deck_delay_secs: u64,

    /// Fixed shuffle seed (reproducible drawings)
    pub seed: Option<u64>,
}

impl Default for DrawingSettings {
    fn default() -> Self {
        Self {
            start_time: "16:00".to_string(),
            turn_secs: 30,
            on_deck_delay_secs: 5,
            seed: None,
        }
    }
}

impl DrawingSettings {
    pub fn turn(&self) -> Duration {
        Duration::from_secs(self.turn_secs)
    }

    pub fn on_deck_delay(&self) -> Duration {
        Duration::from_secs(self.on_deck_delay_secs)
    }

    /// Parse the daily start time
    pub fn parse_start_time(&self) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(&self.start_time, "%H:%M").map_err(|_| {
            format!(
                "Invalid start_time '{}'. Expected HH:MM",
                self.start_time
            )
        })
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), String> {
        self.parse_start_time()?;

        if self.turn_secs == 0 {
            return Err("turn_secs must be greater than 0".to_string());
        }

        if self.on_deck_delay_secs >= self.turn_secs {
            return Err("on_deck_delay_secs must be shorter than a turn".to_string());
        }

        Ok(())
    }
}
