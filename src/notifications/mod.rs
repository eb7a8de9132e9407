//! Turn notices for drawing entrants
//!
//! Delivery is fire-and-forget: [`dispatch`] spawns the send and only logs
//! failures, so a slow or broken channel can never hold up the drawing.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │      Engine (turn advancement)             │
//! └────────────────────────────────────────────┘
//!                     │ dispatch()
//!         ┌───────────┼───────────┐
//!         ▼           ▼           ▼
//!   ┌─────────┐ ┌─────────┐ ┌─────────┐
//!   │ Webhook │ │   Log   │ │ Memory  │
//!   └─────────┘ └─────────┘ └─────────┘
//! ```

pub mod webhook;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use webhook::{WebhookConfig, WebhookNotifier};

/// Result type for notifier operations
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors that can occur while delivering a notice
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid notifier configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Endpoint answered with a non-success status
    #[error("Delivery rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// One delivered notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub contact: String,
    pub message: String,
}

/// Notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the notifier name
    fn name(&self) -> &str;

    /// Deliver `message` to `contact`
    async fn notify(&self, contact: &str, message: &str) -> NotifyResult<()>;
}

/// Shared notifier handle
pub type SharedNotifier = Arc<dyn Notifier>;

/// Send a notice in the background after `delay`
///
/// Failures are logged and dropped.
pub fn dispatch(notifier: SharedNotifier, contact: String, message: String, delay: Duration) {
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match notifier.notify(&contact, &message).await {
            Ok(()) => tracing::debug!(notifier = notifier.name(), %contact, "Notice delivered"),
            Err(e) => tracing::warn!(
                notifier = notifier.name(),
                %contact,
                error = %e,
                "Failed to deliver notice"
            ),
        }
    });
}

// ============================================================================
// Log Notifier
// ============================================================================

/// Notifier that only writes notices to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, contact: &str, message: &str) -> NotifyResult<()> {
        tracing::info!(%contact, %message, "Notice");
        Ok(())
    }
}

// ============================================================================
// Memory Notifier
// ============================================================================

/// Notifier that records every notice (for testing)
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices delivered so far, oldest first
    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        "memory"
    }

    async fn notify(&self, contact: &str, message: &str) -> NotifyResult<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Notice {
                contact: contact.to_string(),
                message: message.to_string(),
            });
        }
        Ok(())
    }
}
