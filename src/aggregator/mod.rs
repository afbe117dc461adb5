//! Update cycles: query the store, publish gauges.
//!
//! A cycle runs every [`Task`] in order and collects their writes. Only a
//! fully collected batch is handed to [`GaugeRegistry::apply`]; a failed
//! query aborts the cycle and leaves every gauge at its previous value.

pub mod deployed;
pub mod rows;
pub mod tasks;

pub use tasks::Task;

use crate::error::{Error, Result};
use crate::registry::{GaugeRegistry, GaugeUpdate};
use crate::store::DocumentStore;
use crate::telemetry::cycle::{record_published, record_task, start_cycle_span};
use crate::telemetry::metrics;
use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{Instrument, info, warn};
use uuid::Uuid;

/// What an [`MetricsAggregator::update`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// All tasks ran and this many gauge updates were published.
    Published { updates: usize },
    /// Another cycle was still running; nothing was done.
    Skipped,
}

/// Runs update cycles against a store and publishes into a registry.
pub struct MetricsAggregator {
    store: Arc<dyn DocumentStore>,
    registry: Arc<GaugeRegistry>,
    in_flight: Mutex<()>,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<GaugeRegistry>) -> Self {
        Self {
            store,
            registry,
            in_flight: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<GaugeRegistry> {
        &self.registry
    }

    /// Run one cycle stamped with the current time.
    pub async fn update(&self) -> Result<CycleOutcome> {
        self.update_at(Utc::now()).await
    }

    /// Run one cycle as of `now`.
    ///
    /// At most one cycle runs at a time; a call made while another is in
    /// flight returns [`CycleOutcome::Skipped`] without querying.
    pub async fn update_at(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("previous update cycle still running, skipping");
            metrics::cycles().add(1, &[KeyValue::new("result", "skipped")]);
            return Ok(CycleOutcome::Skipped);
        };

        let cycle_id = Uuid::new_v4();
        let span = start_cycle_span(&cycle_id);
        let start = Instant::now();

        let result = async {
            let updates = self.collect_in(&span, now).await?;
            self.registry.apply(&updates)?;
            Ok::<_, Error>(updates.len())
        }
        .instrument(span.clone())
        .await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::cycle_duration_ms().record(elapsed_ms, &[]);

        match result {
            Ok(updates) => {
                record_published(&span, updates);
                metrics::cycles().add(1, &[KeyValue::new("result", "ok")]);
                info!(cycle_id = %cycle_id, updates, elapsed_ms, "metrics updated");
                Ok(CycleOutcome::Published { updates })
            }
            Err(e) => {
                metrics::cycles().add(1, &[KeyValue::new("result", "error")]);
                Err(e)
            }
        }
    }

    /// Run every task and return the writes a cycle would publish, without
    /// publishing them.
    pub async fn collect(&self, now: DateTime<Utc>) -> Result<Vec<GaugeUpdate>> {
        let span = tracing::Span::current();
        self.collect_in(&span, now).await
    }

    async fn collect_in(&self, span: &tracing::Span, now: DateTime<Utc>) -> Result<Vec<GaugeUpdate>> {
        let mut updates = Vec::new();
        for task in Task::ALL {
            record_task(span, task.name());
            updates.extend(task.run(self.store.as_ref(), now).await?);
        }
        Ok(updates)
    }
}
