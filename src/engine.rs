//! The stand board engine
//!
//! One engine owns the ledger, the drawing state and the turn timer. Every
//! mutating operation holds the engine mutex for its whole read-check-write
//! sequence, so no caller ever sees half of another caller's change.
//!
//! # Example
//!
//! ```no_run
//! use standboard::engine::Engine;
//! use standboard::occupancy::CheckRequest;
//! use standboard::storage::create_memory_store;
//!
//! # async fn demo() -> standboard::error::Result<()> {
//! let engine = Engine::builder(create_memory_store()?).build();
//! engine.toggle_entry("pat").await?;
//! engine.start_lottery().await;
//! engine.attempt_check(CheckRequest::new("7B", "pat")).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::Config;
use crate::drawing::{draw_order, drawing_rng, DrawPhase, DrawingSettings, DrawingState};
use crate::error::{Error, Rejection, Result};
use crate::ledger::Ledger;
use crate::metrics;
use crate::models::{Adjacency, BoardEntry, Entrant, LocationId, Member, UserId};
use crate::notifications::{dispatch, LogNotifier, SharedNotifier, WebhookConfig, WebhookNotifier};
use crate::occupancy::{CheckOutcome, CheckRequest, Direction, OccupancyManager, SeasonPolicy};
use crate::storage::{self, RecordedOrder, SharedOccupancyStore};

/// Source of "now" for season and daily-limit rules
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Clock pinned to a single instant
pub fn fixed_clock(at: DateTime<Local>) -> Clock {
    Arc::new(move || at)
}

/// Drawing status as seen by one member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawStatus {
    /// Place in the running order
    pub position: Option<usize>,
    pub is_running: bool,
    /// Index of the entrant whose turn it is
    pub current_index: Option<usize>,
    pub seconds_remaining: Option<u64>,
    /// Entered for the next drawing
    pub entered: bool,
    pub phase: DrawPhase,
}

/// Result of an entry toggle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryToggle {
    pub user: UserId,
    pub entered: bool,
}

/// A drawing that started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotterySummary {
    pub draw_id: Uuid,
    /// Stands cleared before ordering
    pub evicted: usize,
    pub order: Vec<UserId>,
}

struct Shared {
    state: Mutex<DrawingState>,
    manager: OccupancyManager,
    notifier: SharedNotifier,
    settings: DrawingSettings,
    clock: Clock,
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    store: SharedOccupancyStore,
    policy: SeasonPolicy,
    settings: DrawingSettings,
    notifier: Option<SharedNotifier>,
    clock: Option<Clock>,
}

impl EngineBuilder {
    /// Set the season policy
    pub fn policy(mut self, policy: SeasonPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the drawing settings
    pub fn settings(mut self, settings: DrawingSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the notifier (defaults to log-only)
    pub fn notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the clock (defaults to the local wall clock)
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the engine
    pub fn build(self) -> Engine {
        let rng = drawing_rng(self.settings.seed);
        let manager = OccupancyManager::new(Ledger::new(self.store), self.policy);
        let notifier: SharedNotifier = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(LogNotifier),
        };
        let clock: Clock = match self.clock {
            Some(clock) => clock,
            None => Arc::new(Local::now),
        };

        Engine {
            shared: Arc::new(Shared {
                state: Mutex::new(DrawingState::new(rng)),
                manager,
                notifier,
                settings: self.settings,
                clock,
            }),
        }
    }
}

/// Cloneable handle to the single board engine
///
/// Turn timers hold only a weak reference and are aborted once the last
/// handle drops.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
}

impl Engine {
    /// Start building an engine over `store`
    pub fn builder(store: SharedOccupancyStore) -> EngineBuilder {
        EngineBuilder {
            store,
            policy: SeasonPolicy::default(),
            settings: DrawingSettings::default(),
            notifier: None,
            clock: None,
        }
    }

    /// Open the configured SQLite store (seeding the stand catalog when
    /// empty) and wire up the configured notifier
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = storage::create_sqlite_store(&config.database.sqlite_path)?;

        let notifier: SharedNotifier = match &config.notifications.webhook_url {
            Some(url) => {
                let mut webhook = WebhookConfig::new(url.clone())
                    .with_timeout(config.notifications.timeout_secs);
                if let Some(token) = &config.notifications.auth_token {
                    webhook = webhook.with_auth_token(token.clone());
                }
                Arc::new(WebhookNotifier::new(webhook)?)
            }
            None => Arc::new(LogNotifier),
        };

        Ok(Self::builder(store)
            .policy(config.season.clone())
            .settings(config.drawing.clone())
            .notifier(notifier)
            .build())
    }

    pub fn settings(&self) -> &DrawingSettings {
        &self.shared.settings
    }

    pub fn policy(&self) -> &SeasonPolicy {
        self.shared.manager.policy()
    }

    fn ledger(&self) -> &Ledger {
        self.shared.manager.ledger()
    }

    fn store(&self) -> &SharedOccupancyStore {
        self.ledger().store()
    }

    fn now(&self) -> DateTime<Local> {
        (self.shared.clock)()
    }

    // ========================================================================
    // Occupancy
    // ========================================================================

    /// Toggle `request.user` in or out of `request.location`
    pub async fn attempt_check(&self, request: CheckRequest) -> Result<CheckOutcome> {
        let result = self.check(request).await;
        match &result {
            Ok(outcome) => metrics::record_check(outcome.direction.as_str()),
            Err(Error::Rejected(_)) => metrics::record_check("rejected"),
            Err(_) => metrics::record_check("failed"),
        }
        log_failure("attempt_check", &result);
        result
    }

    async fn check(&self, request: CheckRequest) -> Result<CheckOutcome> {
        let (location, user) = request.identifiers()?;

        let mut state = self.shared.state.lock().await;
        let now = self.now();
        let manager = &self.shared.manager;

        let placement = manager.evaluate(location, user, request.force, &now)?;

        let turn_bound = !placement.force && placement.direction == Direction::CheckIn;
        if turn_bound {
            if state.is_locked() {
                return Err(Rejection::DrawProcessing.into());
            }
            if state.is_running() && !state.is_turn_of(&placement.user) {
                return Err(Rejection::NotYourTurn.into());
            }
        }

        manager.check_daily_limit(&placement, &now)?;
        let outcome = manager.commit(&placement, request.guest, &now)?;

        if turn_bound && state.is_running() {
            state.checkins_this_turn += 1;
            if state.checkins_this_turn >= placement.max_places {
                tracing::info!(
                    user = %placement.user,
                    max_places = placement.max_places,
                    "Entrant holds the season maximum, passing the turn"
                );
                self.advance_locked(&mut state, "filled");
            }
        }

        Ok(outcome)
    }

    /// Every open session on the board
    pub async fn board(&self) -> Result<Vec<BoardEntry>> {
        let _state = self.shared.state.lock().await;
        Ok(self.ledger().board()?)
    }

    /// Record that two stands border each other
    pub async fn add_adjacency(&self, a: &str, b: &str) -> Result<Adjacency> {
        let result = self.border(a, b).await;
        log_failure("add_adjacency", &result);
        result
    }

    async fn border(&self, a: &str, b: &str) -> Result<Adjacency> {
        let (Some(a), Some(b)) = (LocationId::parse(a), LocationId::parse(b)) else {
            return Err(Rejection::MissingIdentifier.into());
        };
        let edge = Adjacency::new(a, b).ok_or(Rejection::SelfAdjacency)?;

        let _state = self.shared.state.lock().await;
        self.store().add_adjacency(&edge)?;
        tracing::info!(a = %edge.a, b = %edge.b, "Added adjacency");
        Ok(edge)
    }

    /// Create or update a member's contact and priority pass
    pub async fn upsert_member(&self, member: &Member) -> Result<()> {
        let _state = self.shared.state.lock().await;
        self.store().upsert_member(member)?;
        tracing::debug!(user = %member.user, priority = member.priority, "Upserted member");
        Ok(())
    }

    // ========================================================================
    // Drawing
    // ========================================================================

    /// Enter or leave the next drawing
    pub async fn toggle_entry(&self, user: &str) -> Result<EntryToggle> {
        let result = self.entry(user).await;
        log_failure("toggle_entry", &result);
        result
    }

    async fn entry(&self, user: &str) -> Result<EntryToggle> {
        let user = UserId::parse(user).ok_or(Rejection::MissingIdentifier)?;

        let state = self.shared.state.lock().await;
        if state.is_locked() {
            return Err(Rejection::DrawProcessing.into());
        }

        let store = self.store();
        let entered = if store.is_entrant(&user)? {
            store.remove_entrant(&user)?;
            false
        } else {
            store.add_entrant(&user)?;
            true
        };

        tracing::info!(user = %user, entered, "Toggled drawing entry");
        Ok(EntryToggle { user, entered })
    }

    /// Members entered for the next drawing, in entry order
    pub async fn entrants(&self) -> Result<Vec<Entrant>> {
        let _state = self.shared.state.lock().await;
        Ok(self.store().entrants()?)
    }

    /// Most recently persisted drawing order
    pub async fn last_order(&self) -> Result<Option<RecordedOrder>> {
        let _state = self.shared.state.lock().await;
        Ok(self.store().last_entrant_order()?)
    }

    /// Clear the board, order the entrants and start the first turn
    ///
    /// Never fails outwardly: faults are logged and the drawing is
    /// abandoned with entrants left in place. Returns `None` when no
    /// drawing started, including when one is already locked or running.
    pub async fn start_lottery(&self) -> Option<LotterySummary> {
        {
            let mut state = self.shared.state.lock().await;
            if state.is_locked() || state.is_running() {
                tracing::info!("Drawing already in progress, ignoring start");
                return None;
            }
            state.locked = true;
        }
        tracing::info!("Drawing locked");

        let evicted = self.evict_all().await;
        let prepared = self.prepare_order().await;

        let mut state = self.shared.state.lock().await;
        state.locked = false;

        match prepared {
            Ok((draw_id, order)) => {
                let users: Vec<UserId> = order.iter().map(|e| e.user.clone()).collect();
                metrics::record_lottery_started(order.len());
                tracing::info!(%draw_id, entrants = order.len(), evicted, "Drawing started");

                state.draw_id = Some(draw_id);
                state.order = order;
                state.current = None;
                self.advance_locked(&mut state, "start");

                Some(LotterySummary {
                    draw_id,
                    evicted,
                    order: users,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to prepare drawing order, drawing abandoned");
                None
            }
        }
    }

    /// Force every occupant off the board
    async fn evict_all(&self) -> usize {
        let board = {
            let _state = self.shared.state.lock().await;
            self.ledger().board()
        };

        let board = match board {
            Ok(board) => board,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read board for eviction");
                return 0;
            }
        };

        let mut evicted = 0;
        for entry in board {
            let _state = self.shared.state.lock().await;
            match self.evict(&entry) {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(
                    user = %entry.occupant,
                    location = %entry.location,
                    error = %e,
                    "Failed to evict occupant"
                ),
            }
        }

        metrics::record_evictions(evicted);
        evicted
    }

    fn evict(&self, entry: &BoardEntry) -> Result<bool> {
        // The occupant may have checked out since the board was read
        if !self.ledger().is_occupying(&entry.occupant, &entry.location)? {
            return Ok(false);
        }

        let now = self.now();
        let manager = &self.shared.manager;
        let placement =
            manager.evaluate(entry.location.clone(), entry.occupant.clone(), true, &now)?;
        manager.commit(&placement, None, &now)?;
        Ok(true)
    }

    async fn prepare_order(&self) -> Result<(Uuid, Vec<Entrant>)> {
        let order = {
            let mut state = self.shared.state.lock().await;
            let entrants = self.store().entrants()?;
            draw_order(entrants, &mut state.rng)
        };

        let draw_id = Uuid::new_v4();
        let users: Vec<UserId> = order.iter().map(|e| e.user.clone()).collect();

        let _state = self.shared.state.lock().await;
        self.store().consume_entrants_into_order(&draw_id, &users)?;

        Ok((draw_id, order))
    }

    /// Pass the turn to the next entrant
    pub async fn advance_turn(&self) {
        let mut state = self.shared.state.lock().await;
        if state.is_locked() || !state.is_running() {
            tracing::debug!("No running drawing to advance");
            return;
        }
        self.advance_locked(&mut state, "manual");
    }

    /// Give up the current turn
    pub async fn skip_turn(&self, user: &str) -> Result<()> {
        let result = self.skip(user).await;
        log_failure("skip_turn", &result);
        result
    }

    async fn skip(&self, user: &str) -> Result<()> {
        let user = UserId::parse(user).ok_or(Rejection::MissingIdentifier)?;

        let mut state = self.shared.state.lock().await;
        if !state.is_running() {
            return Err(Rejection::DrawNotHappening.into());
        }
        if !state.is_turn_of(&user) {
            return Err(Rejection::NotYourTurn.into());
        }

        tracing::info!(user = %user, "Turn skipped");
        self.advance_locked(&mut state, "skip");
        Ok(())
    }

    /// Drawing status for `user`
    pub async fn current_status(&self, user: &str) -> Result<DrawStatus> {
        let user = UserId::parse(user).ok_or(Rejection::MissingIdentifier)?;

        let state = self.shared.state.lock().await;
        let store = self.store();
        let entered = store.is_entrant(&user)?;
        let has_entrants = entered || !store.entrants()?.is_empty();

        Ok(DrawStatus {
            position: state.position_of(&user),
            is_running: state.is_running(),
            current_index: state.current,
            seconds_remaining: state.seconds_remaining(Instant::now()),
            entered,
            phase: state.phase(has_entrants),
        })
    }

    /// Whether a drawing is locked or running
    pub async fn is_drawing(&self) -> bool {
        let state = self.shared.state.lock().await;
        state.is_locked() || state.is_running()
    }

    /// Abandon any running drawing and cancel its timer
    pub async fn shutdown(&self) {
        let mut state = self.shared.state.lock().await;
        if state.is_running() {
            tracing::warn!(draw_id = ?state.draw_id, "Abandoning running drawing");
        }
        state.finish();
    }

    // ========================================================================
    // Turn timer
    // ========================================================================

    /// Move the pointer, re-arm the timer and send notices
    ///
    /// Caller holds the engine mutex.
    fn advance_locked(&self, state: &mut DrawingState, cause: &'static str) {
        state.cancel_timer();
        state.generation = state.generation.wrapping_add(1);
        state.checkins_this_turn = 0;

        let next = state.current.map_or(0, |i| i + 1);
        let Some(entrant) = state.order.get(next).cloned() else {
            tracing::info!(draw_id = ?state.draw_id, cause, "Drawing finished");
            self.record_position(state, None);
            state.finish();
            metrics::record_turn_advanced(cause, None);
            return;
        };

        let deadline = Instant::now() + self.shared.settings.turn();
        state.current = Some(next);
        state.deadline = Some(deadline);
        state.timer = Some(self.arm_timer(deadline, state.generation));
        self.record_position(state, Some(next));

        tracing::info!(index = next, user = %entrant.user, cause, "Turn advanced");
        metrics::record_turn_advanced(cause, Some(next));

        self.notify_turn(&entrant, state.order.get(next + 1));
    }

    fn record_position(&self, state: &DrawingState, position: Option<usize>) {
        let Some(draw_id) = state.draw_id else {
            return;
        };
        if let Err(e) = self.store().record_draw_position(&draw_id, position) {
            tracing::error!(%draw_id, error = %e, "Failed to record turn position");
        }
    }

    fn arm_timer(&self, deadline: Instant, generation: u64) -> JoinHandle<()> {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(shared) = shared.upgrade() {
                Engine { shared }.expire_turn(generation).await;
            }
        })
    }

    async fn expire_turn(&self, generation: u64) {
        let mut state = self.shared.state.lock().await;
        if state.generation != generation || !state.is_running() {
            tracing::debug!(generation, "Ignoring stale turn timer");
            return;
        }

        // Detach rather than abort: this task is the timer
        state.timer.take();
        self.advance_locked(&mut state, "timeout");
    }

    fn notify_turn(&self, current: &Entrant, on_deck: Option<&Entrant>) {
        let notifier = &self.shared.notifier;
        let settings = &self.shared.settings;

        if let Some(contact) = &current.contact {
            dispatch(
                notifier.clone(),
                contact.clone(),
                format!(
                    "It's your turn to pick a stand. You have {} seconds.",
                    settings.turn_secs
                ),
                Duration::ZERO,
            );
        }

        if let Some(contact) = on_deck.and_then(|e| e.contact.as_ref()) {
            dispatch(
                notifier.clone(),
                contact.clone(),
                "You're on deck for the stand drawing. Get ready!".to_string(),
                settings.on_deck_delay(),
            );
        }
    }
}

fn log_failure<T>(operation: &'static str, result: &Result<T>) {
    match result {
        Ok(_) => {}
        Err(Error::Rejected(reason)) => {
            metrics::record_rejection(reason.code());
            tracing::debug!(operation, code = reason.code(), reason = %reason, "Request rejected");
        }
        Err(e) => tracing::error!(operation, error = %e, "Request failed"),
    }
}
