//! standboard - hunting club stand board
//!
//! Members sign in at numbered stands on a shared board. Occupancy is a
//! projection over an append-only event log, and a daily drawing hands out
//! timed, turn-based first pick.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`engine`] - The single-writer engine tying occupancy and drawing together
//! - [`server`] - HTTP ingress of the running service
//! - [`client`] - HTTP client the CLI uses to reach the service
//! - [`occupancy`] - Check-in/check-out rules (exclusion, caps, chains, daily limit)
//! - [`drawing`] - Drawing order, turn state and the daily trigger
//! - [`ledger`] - Parity projections over the event log
//! - [`storage`] - Storage collaborator (SQLite, in-memory)
//! - [`notifications`] - Turn notices (webhook, log, in-memory)
//! - [`models`] - Core data structures and types
//! - [`catalog`] - The default stand catalog
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use standboard::config::Config;
//! use standboard::engine::Engine;
//! use standboard::occupancy::CheckRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let engine = Engine::from_config(&config)?;
//!     engine.attempt_check(CheckRequest::new("7B", "pat")).await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod drawing;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod occupancy;
pub mod server;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::BoardClient;
    pub use crate::config::Config;
    pub use crate::drawing::{DrawPhase, DrawingSettings};
    pub use crate::engine::{DrawStatus, Engine, EntryToggle, LotterySummary};
    pub use crate::error::{BoardErrorTrait, Error, ErrorCategory, Rejection, Result};
    pub use crate::models::{BoardEntry, Entrant, LocationId, Member, UserId};
    pub use crate::occupancy::{CheckOutcome, CheckRequest, Direction, SeasonPolicy};
    pub use crate::storage::{OccupancyStore, SharedOccupancyStore};
}

// Direct re-exports for convenience
pub use engine::Engine;
pub use models::{LocationId, UserId};
