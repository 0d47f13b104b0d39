//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the opener server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Controller status (collected dynamically)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};

use opener_core::UiPhase;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "opener_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("opener_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "opener_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "opener_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "opener_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by type.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("opener_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "opener_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Controller Metrics (collected dynamically)
// =============================================================================

/// Current UI phase (1 for the active phase, 0 otherwise).
pub static CONTROLLER_PHASE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("opener_controller_phase", "Current controller phase"),
        &["phase"],
    )
    .unwrap()
});

/// Whether conversion has been disabled for the session.
pub static CONVERSION_DISABLED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "opener_conversion_disabled",
        "Whether conversion is disabled (1) or available (0)",
    )
    .unwrap()
});

/// Live preview handles.
pub static PREVIEW_HANDLES_LIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "opener_preview_handles_live",
        "Number of preview handles currently resolvable",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Controller
    registry
        .register(Box::new(CONTROLLER_PHASE.clone()))
        .unwrap();
    registry
        .register(Box::new(CONVERSION_DISABLED.clone()))
        .unwrap();
    registry
        .register(Box::new(PREVIEW_HANDLES_LIVE.clone()))
        .unwrap();

    // Core metrics (files, previews, engine, conversions)
    for metric in opener_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the controller snapshot.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let snapshot = state.controller().snapshot().await;

    for phase in [
        UiPhase::Empty,
        UiPhase::Loaded,
        UiPhase::ErrorShown,
        UiPhase::Converting,
    ] {
        let value = if snapshot.phase == phase { 1 } else { 0 };
        CONTROLLER_PHASE
            .with_label_values(&[phase_label(phase)])
            .set(value);
    }

    CONVERSION_DISABLED.set(if snapshot.conversion_disabled { 1 } else { 0 });
    PREVIEW_HANDLES_LIVE.set(snapshot.preview.live as i64);
}

fn phase_label(phase: UiPhase) -> &'static str {
    match phase {
        UiPhase::Empty => "empty",
        UiPhase::Loaded => "loaded",
        UiPhase::ErrorShown => "error_shown",
        UiPhase::Converting => "converting",
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let uuid_regex = regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap();

    uuid_regex.replace_all(path, "{id}").to_string()
}
