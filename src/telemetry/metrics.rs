//! Self-instrumentation for the exporter.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! These describe the exporter's own health; the published LibreChat gauges
//! live in [`crate::registry`].

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("librechat-metrics")
}

/// Counter: update cycles by outcome.
/// Labels: `result` ("ok" | "error" | "skipped").
pub fn cycles() -> Counter<u64> {
    meter()
        .u64_counter("librechat_metrics.cycles")
        .with_description("Number of update cycles by outcome")
        .build()
}

/// Histogram: wall time of one update cycle in milliseconds.
pub fn cycle_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("librechat_metrics.cycle.duration_ms")
        .with_description("Update cycle duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: store queries issued.
/// Labels: `collection`, `operation`.
pub fn store_queries() -> Counter<u64> {
    meter()
        .u64_counter("librechat_metrics.store.queries")
        .with_description("Number of document store queries")
        .build()
}

/// Histogram: store query duration in milliseconds.
/// Labels: `collection`, `operation`.
pub fn store_query_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("librechat_metrics.store.query.duration_ms")
        .with_description("Document store query duration in milliseconds")
        .with_unit("ms")
        .build()
}
