//! Configuration management for the stand board
//!
//! Configuration comes from environment variables (`STANDBOARD_*`) or a
//! TOML file. Every section has defaults, so a file only needs the keys it
//! changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::drawing::DrawingSettings;
use crate::notifications::WebhookConfig;
use crate::occupancy::SeasonPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Daily drawing
    pub drawing: DrawingSettings,

    /// Seasonal stand caps and daily session limits
    pub season: SeasonPolicy,

    /// Turn notices
    pub notifications: NotificationConfig,

    /// HTTP ingress of the running service
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/standboard.db"),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Text/email relay endpoint; notices are only logged when unset
    pub webhook_url: Option<String>,

    /// Bearer token for the relay
    pub auth_token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            auth_token: None,
            timeout_secs: 10,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address `run` listens on
    pub bind: String,

    /// Base URL CLI commands send requests to; derived from `bind` when unset
    pub url: Option<String>,

    /// Client request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: String::from("127.0.0.1:7878"),
            url: None,
            timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// URL the CLI talks to
    pub fn base_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("http://{}", self.bind),
        }
    }

    /// Parsed listen address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Season windows can only be changed through a config file.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let sqlite_path = std::env::var("STANDBOARD_SQLITE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database.sqlite_path);

        let drawing = DrawingSettings {
            start_time: std::env::var("STANDBOARD_DRAW_TIME")
                .unwrap_or(defaults.drawing.start_time),
            turn_secs: env_parse("STANDBOARD_TURN_SECS").unwrap_or(defaults.drawing.turn_secs),
            on_deck_delay_secs: env_parse("STANDBOARD_ON_DECK_DELAY_SECS")
                .unwrap_or(defaults.drawing.on_deck_delay_secs),
            seed: env_parse("STANDBOARD_DRAW_SEED"),
        };

        let season = SeasonPolicy {
            default_max_places: env_parse("STANDBOARD_DEFAULT_MAX_PLACES")
                .unwrap_or(defaults.season.default_max_places),
            daily_session_cap: env_parse("STANDBOARD_DAILY_SESSION_CAP")
                .unwrap_or(defaults.season.daily_session_cap),
            session_cutoff_hour: env_parse("STANDBOARD_SESSION_CUTOFF_HOUR")
                .unwrap_or(defaults.season.session_cutoff_hour),
            ..defaults.season
        };

        let notifications = NotificationConfig {
            webhook_url: std::env::var("STANDBOARD_WEBHOOK_URL").ok(),
            auth_token: std::env::var("STANDBOARD_WEBHOOK_TOKEN").ok(),
            timeout_secs: env_parse("STANDBOARD_WEBHOOK_TIMEOUT")
                .unwrap_or(defaults.notifications.timeout_secs),
        };

        let server = ServerConfig {
            bind: std::env::var("STANDBOARD_BIND").unwrap_or(defaults.server.bind),
            url: std::env::var("STANDBOARD_SERVER_URL").ok(),
            timeout_secs: env_parse("STANDBOARD_SERVER_TIMEOUT")
                .unwrap_or(defaults.server.timeout_secs),
        };

        let logging = LoggingConfig {
            level: std::env::var("STANDBOARD_LOG_LEVEL").unwrap_or(defaults.logging.level),
            format: std::env::var("STANDBOARD_LOG_FORMAT").unwrap_or(defaults.logging.format),
        };

        Ok(Self {
            database: DatabaseConfig { sqlite_path },
            drawing,
            season,
            notifications,
            server,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.drawing
            .validate()
            .map_err(|e| anyhow::anyhow!("drawing: {e}"))?;

        self.season
            .validate()
            .map_err(|e| anyhow::anyhow!("season: {e}"))?;

        if let Some(url) = &self.notifications.webhook_url {
            WebhookConfig::new(url.clone())
                .with_timeout(self.notifications.timeout_secs)
                .validate()
                .map_err(|e| anyhow::anyhow!("notifications: {e}"))?;
        }

        self.server.bind_addr().context("server")?;
        let base = url::Url::parse(&self.server.base_url())
            .with_context(|| format!("server: invalid url '{}'", self.server.base_url()))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("server.url must use http or https, got '{}'", base.scheme());
        }
        if self.server.timeout_secs == 0 {
            anyhow::bail!("server.timeout_secs must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            );
        }

        Ok(())
    }

    /// Get turn length as Duration
    #[must_use]
    pub fn turn_duration(&self) -> Duration {
        self.drawing.turn()
    }
}
