//! Daily drawing trigger
//!
//! Sleeps until the configured local start time, starts the drawing, and
//! repeats every day until stopped.

use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone};
use tokio::sync::watch;

use crate::engine::Engine;

/// Next local instant at `start` strictly after `now`
///
/// Days where `start` falls in a DST gap are skipped; an ambiguous time
/// resolves to its earlier occurrence.
pub fn next_start(start: NaiveTime, now: &DateTime<Local>) -> Option<DateTime<Local>> {
    let today = now.date_naive();
    (0..=2)
        .filter_map(|offset| {
            let day = today + Duration::days(offset);
            Local.from_local_datetime(&day.and_time(start)).earliest()
        })
        .find(|candidate| candidate > now)
}

/// Time left until the next drawing
pub fn duration_until_start(start: NaiveTime, now: &DateTime<Local>) -> std::time::Duration {
    next_start(start, now)
        .and_then(|at| at.signed_duration_since(*now).to_std().ok())
        .unwrap_or(std::time::Duration::from_secs(60))
}

/// Starts a drawing once a day
pub struct DrawTrigger {
    engine: Engine,
    start: NaiveTime,
    stop: watch::Sender<bool>,
}

impl DrawTrigger {
    pub fn new(engine: Engine, start: NaiveTime) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            engine,
            start,
            stop,
        }
    }

    /// Build from the engine's configured start time
    pub fn from_settings(engine: Engine) -> Result<Self, String> {
        let start = engine.settings().parse_start_time()?;
        Ok(Self::new(engine, start))
    }

    /// Run the trigger loop until [`DrawTrigger::stop`] is called
    pub async fn run(&self) {
        let mut stopped = self.stop.subscribe();
        if *stopped.borrow() {
            return;
        }

        loop {
            let wait = duration_until_start(self.start, &Local::now());
            tracing::info!(
                start = %self.start,
                wait_secs = wait.as_secs(),
                "Waiting for next drawing"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    match self.engine.start_lottery().await {
                        Some(summary) => tracing::info!(
                            draw_id = %summary.draw_id,
                            entrants = summary.order.len(),
                            "Scheduled drawing started"
                        ),
                        None => tracing::info!("Scheduled drawing did not start"),
                    }
                }
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Drawing trigger stopped");
    }

    /// Stop the trigger loop
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Check if the trigger has been stopped
    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }
}
