//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - File selection (accepted and rejected inputs)
//! - Preview handle lifecycle
//! - Engine loads and conversion jobs

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// File Selection Metrics
// =============================================================================

/// Files accepted as the current asset.
pub static FILES_SELECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("opener_files_selected_total", "Total files accepted").unwrap()
});

/// Files rejected by validation.
pub static FILES_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("opener_files_rejected_total", "Total files rejected"),
        &["reason"], // "size_exceeded"
    )
    .unwrap()
});

// =============================================================================
// Preview Metrics
// =============================================================================

/// Preview handles created.
pub static PREVIEW_HANDLES_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "opener_preview_handles_created_total",
        "Total preview handles created",
    )
    .unwrap()
});

/// Preview handles revoked.
pub static PREVIEW_HANDLES_REVOKED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "opener_preview_handles_revoked_total",
        "Total preview handles revoked",
    )
    .unwrap()
});

// =============================================================================
// Engine and Conversion Metrics
// =============================================================================

/// Engine load attempts by result.
pub static ENGINE_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("opener_engine_loads_total", "Total engine load attempts"),
        &["result"], // "success", "unavailable", "failed"
    )
    .unwrap()
});

/// Conversions by operation and result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("opener_conversions_total", "Total conversion jobs"),
        &["operation", "result"], // result: "succeeded", "failed", "cancelled"
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "opener_conversion_duration_seconds",
            "Duration of conversion jobs",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 180.0, 600.0, 1800.0]),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(FILES_SELECTED.clone()),
        Box::new(FILES_REJECTED.clone()),
        Box::new(PREVIEW_HANDLES_CREATED.clone()),
        Box::new(PREVIEW_HANDLES_REVOKED.clone()),
        Box::new(ENGINE_LOADS.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
    ]
}
