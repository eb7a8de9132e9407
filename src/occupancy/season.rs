//! Seasonal occupancy policy
//!
//! The number of stands one member may hold at once depends on the time of
//! year. Windows are checked in order and the first one containing the month
//! wins; months outside every window use `default_max_places`.

use chrono::{DateTime, Datelike, TimeZone};
use serde::{Deserialize, Serialize};

/// Inclusive month range with its per-member stand cap
///
/// A window whose `start_month` is after its `end_month` wraps the new year
/// (e.g. 12..=1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    pub start_month: u32,
    pub end_month: u32,
    pub max_places: usize,
}

impl SeasonWindow {
    pub fn new(start_month: u32, end_month: u32, max_places: usize) -> Self {
        Self {
            start_month,
            end_month,
            max_places,
        }
    }

    /// Check whether `month` (1-12) falls inside this window
    pub fn contains(&self, month: u32) -> bool {
        if self.start_month <= self.end_month {
            (self.start_month..=self.end_month).contains(&month)
        } else {
            month >= self.start_month || month <= self.end_month
        }
    }
}

/// Stand caps and daily session limits by season
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonPolicy {
    /// Ordered windows, first match wins
    pub windows: Vec<SeasonWindow>,

    /// Cap for months outside every window
    pub default_max_places: usize,

    /// Sessions per (member, stand) per day while the cap is 1
    pub daily_session_cap: usize,

    /// Sessions opened before this local hour do not count toward the cap
    pub session_cutoff_hour: u32,
}

impl Default for SeasonPolicy {
    fn default() -> Self {
        Self {
            windows: vec![
                SeasonWindow::new(10, 11, 1),
                SeasonWindow::new(9, 9, 2),
                SeasonWindow::new(12, 12, 2),
            ],
            default_max_places: 4,
            daily_session_cap: 2,
            session_cutoff_hour: 12,
        }
    }
}

impl SeasonPolicy {
    /// Cap that applies during `month` (1-12)
    pub fn max_places_for_month(&self, month: u32) -> usize {
        self.windows
            .iter()
            .find(|w| w.contains(month))
            .map(|w| w.max_places)
            .unwrap_or(self.default_max_places)
    }

    /// Cap that applies at `at`
    pub fn max_places<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> usize {
        self.max_places_for_month(at.month())
    }

    /// Whether the daily session limit applies at `at`
    pub fn is_session_limited<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> bool {
        self.max_places(at) == 1
    }

    /// Validate policy values
    pub fn validate(&self) -> Result<(), String> {
        if self.default_max_places == 0 {
            return Err("default_max_places must be at least 1".to_string());
        }

        for window in &self.windows {
            if !(1..=12).contains(&window.start_month) || !(1..=12).contains(&window.end_month) {
                return Err(format!(
                    "season window {}..{} has a month outside 1-12",
                    window.start_month, window.end_month
                ));
            }
            if window.max_places == 0 {
                return Err(format!(
                    "season window {}..{} must allow at least 1 place",
                    window.start_month, window.end_month
                ));
            }
        }

        if self.session_cutoff_hour > 23 {
            return Err(format!(
                "session_cutoff_hour {} must be 0-23",
                self.session_cutoff_hour
            ));
        }

        Ok(())
    }
}
