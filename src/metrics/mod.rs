//! Prometheus metrics for the stand board
//!
//! Tracks:
//! - Occupancy: check attempts by outcome, rejections by code
//! - Drawing: lotteries started, turns advanced, current turn index
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for occupancy metrics
struct OccupancyMetrics {
    checks: CounterVec,
    rejections: CounterVec,
    evictions: Counter,
}

/// Container for drawing metrics
struct DrawingMetrics {
    lotteries_started: Counter,
    turns_advanced: CounterVec,
    current_turn: Gauge,
    entrants: Histogram,
}

static OCCUPANCY_METRICS: OnceLock<OccupancyMetrics> = OnceLock::new();

static DRAWING_METRICS: OnceLock<DrawingMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Registration failures are returned once; afterwards every recorder is
/// a no-op.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = standboard::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let occupancy = OccupancyMetrics {
        checks: register_counter_vec!(
            "standboard_check_attempts_total",
            "Check attempts by outcome",
            &["outcome"]
        )?,
        rejections: register_counter_vec!(
            "standboard_rejections_total",
            "Rejected requests by reason code",
            &["code"]
        )?,
        evictions: register_counter!(
            "standboard_evictions_total",
            "Stands cleared by the pre-drawing sweep"
        )?,
    };

    let drawing = DrawingMetrics {
        lotteries_started: register_counter!(
            "standboard_lotteries_started_total",
            "Total drawings started"
        )?,
        turns_advanced: register_counter_vec!(
            "standboard_turns_advanced_total",
            "Turn advances by cause",
            &["cause"]
        )?,
        current_turn: register_gauge!(
            "standboard_current_turn_index",
            "Index of the entrant whose turn it is (-1 when idle)"
        )?,
        entrants: register_histogram!(
            "standboard_drawing_entrants",
            "Entrants per drawing",
            vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0]
        )?,
    };

    OCCUPANCY_METRICS
        .set(occupancy)
        .map_err(|_| "Occupancy metrics already initialized")?;
    DRAWING_METRICS
        .set(drawing)
        .map_err(|_| "Drawing metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    OCCUPANCY_METRICS.get().is_some() && DRAWING_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record a check attempt (`check_in`, `check_out`, `rejected`, `failed`)
pub fn record_check(outcome: &str) {
    if let Some(m) = OCCUPANCY_METRICS.get() {
        m.checks.with_label_values(&[outcome]).inc();
    }
}

/// Record a rejection by its code
pub fn record_rejection(code: &str) {
    if let Some(m) = OCCUPANCY_METRICS.get() {
        m.rejections.with_label_values(&[code]).inc();
    }
}

/// Record stands cleared by an eviction sweep
pub fn record_evictions(count: usize) {
    if let Some(m) = OCCUPANCY_METRICS.get() {
        m.evictions.inc_by(count as f64);
    }
}

/// Record a drawing start with its entrant count
pub fn record_lottery_started(entrants: usize) {
    let Some(m) = DRAWING_METRICS.get() else {
        return;
    };

    m.lotteries_started.inc();
    m.entrants.observe(entrants as f64);
}

/// Record a turn advance (`start`, `timeout`, `skip`, `filled`)
pub fn record_turn_advanced(cause: &str, current: Option<usize>) {
    let Some(m) = DRAWING_METRICS.get() else {
        return;
    };

    m.turns_advanced.with_label_values(&[cause]).inc();
    m.current_turn
        .set(current.map(|i| i as f64).unwrap_or(-1.0));
}

// ============================================================================
// Tests
// ============================================================================
