//! Prometheus metrics collection for pulsehub.
//!
//! Metrics are registered once at startup and exposed on the HTTP endpoint
//! served by [`crate::http`]. Every helper is a no-op until [`init`] has run,
//! so unit tests can exercise code paths that record metrics without setup.
//!
//! - `pulsehub_connected_users` - registered sessions (gauge)
//! - `pulsehub_presence_events_total{status}` - status updates delivered
//! - `pulsehub_pulses_total{kind}` - single, double and unlinked pulses
//! - `pulsehub_evictions_total{reason}` - sessions closed by the hub
//! - `pulsehub_messages_dropped_total{reason}` - best-effort sends that failed

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Accepted handshakes.
pub static CONNECTIONS_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Status updates delivered to peers, by status.
pub static PRESENCE_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Pulses processed, by outcome.
pub static PULSES: OnceLock<IntCounterVec> = OnceLock::new();

/// Sessions closed by the hub, by reason.
pub static EVICTIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Outbound messages dropped, by reason.
pub static MESSAGES_DROPPED: OnceLock<IntCounterVec> = OnceLock::new();

/// Inbound frames that could not be decoded.
pub static MALFORMED_FRAMES: OnceLock<IntCounter> = OnceLock::new();

/// Connection handler errors, by error code.
pub static HANDLER_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges
// ========================================================================

/// Currently registered sessions.
pub static CONNECTED_USERS: OnceLock<IntGauge> = OnceLock::new();

/// Pulse pairs currently tracked by the reciprocity detector.
pub static CLICK_PAIRS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Inbound frame processing latency by message type.
pub static FRAME_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before metrics are scraped.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(CONNECTIONS_TOTAL, IntCounter::new("pulsehub_connections_total", "Accepted handshakes"));
    register!(PRESENCE_EVENTS, IntCounterVec::new(Opts::new("pulsehub_presence_events_total", "Status updates delivered to peers"), &["status"]));
    register!(PULSES, IntCounterVec::new(Opts::new("pulsehub_pulses_total", "Pulses processed by outcome"), &["kind"]));
    register!(EVICTIONS, IntCounterVec::new(Opts::new("pulsehub_evictions_total", "Sessions closed by the hub"), &["reason"]));
    register!(MESSAGES_DROPPED, IntCounterVec::new(Opts::new("pulsehub_messages_dropped_total", "Outbound messages dropped"), &["reason"]));
    register!(MALFORMED_FRAMES, IntCounter::new("pulsehub_malformed_frames_total", "Inbound frames that failed to decode"));
    register!(HANDLER_ERRORS, IntCounterVec::new(Opts::new("pulsehub_handler_errors_total", "Connection handler errors"), &["code"]));
    register!(CONNECTED_USERS, IntGauge::new("pulsehub_connected_users", "Currently registered sessions"));
    register!(CLICK_PAIRS, IntGauge::new("pulsehub_click_pairs", "Pulse pairs tracked by the reciprocity detector"));
    register!(FRAME_LATENCY, HistogramVec::new(
        HistogramOpts::new("pulsehub_frame_duration_seconds", "Inbound frame processing latency by type")
            .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
        &["type"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

#[inline]
fn inc_vec(metric: &OnceLock<IntCounterVec>, label: &str) {
    if let Some(c) = metric.get() {
        c.with_label_values(&[label]).inc();
    }
}

/// Record an accepted handshake.
#[inline]
pub fn record_connection() {
    if let Some(c) = CONNECTIONS_TOTAL.get() {
        c.inc();
    }
}

/// Record a status update delivered to one peer.
#[inline]
pub fn record_presence(status: &str) {
    inc_vec(&PRESENCE_EVENTS, status);
}

/// Record a processed pulse.
#[inline]
pub fn record_pulse(kind: &str) {
    inc_vec(&PULSES, kind);
}

/// Record a session closed by the hub.
#[inline]
pub fn record_eviction(reason: &str) {
    inc_vec(&EVICTIONS, reason);
}

/// Record a dropped outbound message.
#[inline]
pub fn record_dropped(reason: &str) {
    inc_vec(&MESSAGES_DROPPED, reason);
}

/// Record an undecodable inbound frame.
#[inline]
pub fn record_malformed() {
    if let Some(c) = MALFORMED_FRAMES.get() {
        c.inc();
    }
}

/// Record a connection handler error.
#[inline]
pub fn record_handler_error(code: &str) {
    inc_vec(&HANDLER_ERRORS, code);
}

/// Record inbound frame latency.
#[inline]
pub fn record_frame(kind: &str, duration_secs: f64) {
    if let Some(h) = FRAME_LATENCY.get() {
        h.with_label_values(&[kind]).observe(duration_secs);
    }
}

/// Set the registered session gauge.
#[inline]
pub fn set_connected_users(count: usize) {
    if let Some(g) = CONNECTED_USERS.get() {
        g.set(count as i64);
    }
}

/// Set the tracked pulse pair gauge.
#[inline]
pub fn set_click_pairs(count: usize) {
    if let Some(g) = CLICK_PAIRS.get() {
        g.set(count as i64);
    }
}
