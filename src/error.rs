//! Unified error handling for the standboard crate
//!
//! Two kinds of failure leave the core:
//!
//! - [`Rejection`] - a policy decision. Synchronous, machine-checkable, and
//!   guaranteed to leave the ledger, entrant list and turn pointer untouched.
//! - Everything else ([`StorageError`], [`NotifyError`], config, I/O) - a
//!   fault. Faults are never retried inside the core.
//!
//! # Usage
//!
//! ```rust,ignore
//! use standboard::error::{BoardErrorTrait, Error, ErrorCategory};
//!
//! match engine.attempt_check(request).await {
//!     Ok(outcome) => println!("{outcome:?}"),
//!     Err(Error::Rejected(reason)) => println!("{}: {reason}", reason.code()),
//!     Err(err) if err.is_recoverable() => eprintln!("try again: {err}"),
//!     Err(err) => eprintln!("fatal: {err}"),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

pub use crate::notifications::NotifyError;
pub use crate::storage::StorageError;

/// Common trait for all standboard error types
pub trait BoardErrorTrait: std::error::Error {
    /// Check if the caller may retry the same request later
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Missing or malformed input, rejected before any storage access
    Validation,
    /// Occupancy rule violated after reading the ledger
    Conflict,
    /// Check-in or skip outside the caller's turn
    TurnViolation,
    /// Drawing order is being computed; retry later
    LockContention,
    /// Storage faults
    Storage,
    /// Notification delivery faults
    Notification,
    /// Configuration errors
    Config,
    /// Board service unreachable or failing
    Service,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Conflict => "CONFLICT",
            Self::TurnViolation => "TURN_VIOLATION",
            Self::LockContention => "LOCK_CONTENTION",
            Self::Storage => "STORAGE",
            Self::Notification => "NOTIFICATION",
            Self::Config => "CONFIG",
            Self::Service => "SERVICE",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Rejections
// ============================================================================

/// Policy rejection returned to the member making the request
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rejection {
    #[error("A location and a member name are required")]
    MissingIdentifier,

    #[error("A stand cannot border itself")]
    SelfAdjacency,

    #[error("Someone else is already at that location")]
    AlreadyOccupied,

    #[error("You are already signed in at {max_places} location(s)")]
    OverCapacity { max_places: usize },

    #[error("That location does not border one you are signed in at")]
    NotBordering,

    #[error("That would break the chain of locations you are signed in at")]
    ChainBroken,

    #[error("You have already started {cap} sessions at that location today")]
    DailyLimit { cap: usize },

    #[error("It is not your turn in the drawing")]
    NotYourTurn,

    #[error("There is no drawing happening")]
    DrawNotHappening,

    #[error("The drawing is being processed, try again shortly")]
    DrawProcessing,
}

impl Rejection {
    /// Stable machine-checkable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIdentifier => "MISSING_IDENTIFIER",
            Self::SelfAdjacency => "SELF_ADJACENCY",
            Self::AlreadyOccupied => "ALREADY_OCCUPIED",
            Self::OverCapacity { .. } => "OVER_CAPACITY",
            Self::NotBordering => "NOT_BORDERING",
            Self::ChainBroken => "CHAIN_BROKEN",
            Self::DailyLimit { .. } => "DAILY_LIMIT",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::DrawNotHappening => "DRAW_NOT_HAPPENING",
            Self::DrawProcessing => "DRAW_PROCESSING",
        }
    }
}

impl BoardErrorTrait for Rejection {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::DrawProcessing)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingIdentifier | Self::SelfAdjacency => ErrorCategory::Validation,
            Self::AlreadyOccupied
            | Self::OverCapacity { .. }
            | Self::NotBordering
            | Self::ChainBroken
            | Self::DailyLimit { .. } => ErrorCategory::Conflict,
            Self::NotYourTurn | Self::DrawNotHappening => ErrorCategory::TurnViolation,
            Self::DrawProcessing => ErrorCategory::LockContention,
        }
    }
}

// ============================================================================
// Unified Error
// ============================================================================

/// Unified error type for the standboard crate
#[derive(Error, Debug)]
pub enum Error {
    /// Request refused by an occupancy or drawing rule
    #[error("{0}")]
    Rejected(#[from] Rejection),

    /// Storage collaborator failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Notification collaborator failure
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// HTTP transport failure talking to the board service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The board service answered with a fault
    #[error("Service error ({status}): {message}")]
    Service { status: u16, message: String },

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BoardErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Rejected(r) => r.is_recoverable(),
            Self::Storage(e) => e.is_recoverable(),
            Self::Notify(_) => true,
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::Service { status, .. } => *status >= 500,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Rejected(r) => r.category(),
            Self::Storage(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Notify(_) => ErrorCategory::Notification,
            Self::Config(_) => ErrorCategory::Config,
            Self::Http(_) | Self::Service { .. } => ErrorCategory::Service,
            Self::Json(_) | Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// The rejection carried by this error, if it is one
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
