//! Update-cycle span helpers.

use tracing::Span;
use uuid::Uuid;

/// Start a span for one update cycle.
///
/// `cycle.updates` is declared empty and filled by [`record_published`].
pub fn start_cycle_span(cycle_id: &Uuid) -> Span {
    tracing::info_span!(
        "metrics.cycle",
        "cycle.id" = %cycle_id,
        "cycle.updates" = tracing::field::Empty,
    )
}

/// Emit a `debug` event for a task starting within the cycle span.
pub fn record_task(span: &Span, task: &str) {
    span.in_scope(|| {
        tracing::debug!(task = task, "task started");
    });
}

/// Record how many gauge updates the cycle published.
pub fn record_published(span: &Span, updates: usize) {
    span.record("cycle.updates", updates as u64);
}
