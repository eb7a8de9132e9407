//! Drawing state owned by the engine
//!
//! Only the engine mutates this, and only while holding its mutex.

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::{Entrant, UserId};

/// Lifecycle of the drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrawPhase {
    /// No drawing and nobody entered
    Idle,
    /// Members are entering for the next drawing
    EntrantsOpen,
    /// Order is being computed; entry and fresh check-ins are refused
    Locked,
    /// Turn pointer active
    Running,
}

impl DrawPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::EntrantsOpen => "ENTRANTS_OPEN",
            Self::Locked => "LOCKED",
            Self::Running => "RUNNING",
        }
    }
}

impl std::fmt::Display for DrawPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable drawing state
pub struct DrawingState {
    pub(crate) locked: bool,
    pub(crate) draw_id: Option<Uuid>,
    pub(crate) order: Vec<Entrant>,
    pub(crate) current: Option<usize>,
    pub(crate) deadline: Option<Instant>,
    pub(crate) checkins_this_turn: usize,
    /// Bumped on every advance; a timer only fires for its own generation
    pub(crate) generation: u64,
    pub(crate) timer: Option<JoinHandle<()>>,
    pub(crate) rng: ChaCha8Rng,
}

impl DrawingState {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            locked: false,
            draw_id: None,
            order: Vec::new(),
            current: None,
            deadline: None,
            checkins_this_turn: 0,
            generation: 0,
            timer: None,
            rng,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Phase given whether anyone is entered for the next drawing
    pub fn phase(&self, has_entrants: bool) -> DrawPhase {
        if self.locked {
            DrawPhase::Locked
        } else if self.is_running() {
            DrawPhase::Running
        } else if has_entrants {
            DrawPhase::EntrantsOpen
        } else {
            DrawPhase::Idle
        }
    }

    /// Entrant whose turn it is
    pub fn current_entrant(&self) -> Option<&Entrant> {
        self.current.and_then(|i| self.order.get(i))
    }

    /// Check whether it is `user`'s turn
    pub fn is_turn_of(&self, user: &UserId) -> bool {
        self.current_entrant().is_some_and(|e| &e.user == user)
    }

    /// Position of `user` in the running order
    pub fn position_of(&self, user: &UserId) -> Option<usize> {
        self.order.iter().position(|e| &e.user == user)
    }

    /// Whole seconds left in the current turn, rounded up
    pub fn seconds_remaining(&self, now: Instant) -> Option<u64> {
        let deadline = self.deadline?;
        let left = deadline.saturating_duration_since(now);
        let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
        Some(secs)
    }

    /// Abort the pending turn timer, if any
    pub(crate) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Drop the running order and return to between-drawings
    pub(crate) fn finish(&mut self) {
        self.cancel_timer();
        self.draw_id = None;
        self.order.clear();
        self.current = None;
        self.deadline = None;
        self.checkins_this_turn = 0;
    }
}

impl Drop for DrawingState {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
