//! Fixed-interval driver for update cycles.

use crate::aggregator::{CycleOutcome, MetricsAggregator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Runs [`MetricsAggregator::update`] every `interval` until shut down.
///
/// The first cycle starts immediately. A cycle that outlasts the interval
/// delays the next tick instead of queueing extra ones.
pub struct Scheduler {
    aggregator: Arc<MetricsAggregator>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl Clone for Scheduler {
    fn clone(&self) -> Self {
        Self {
            aggregator: Arc::clone(&self.aggregator),
            interval: self.interval,
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl Scheduler {
    pub fn new(aggregator: Arc<MetricsAggregator>, interval: Duration) -> Self {
        Self {
            aggregator,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the loop to stop after the current cycle.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Run until [`Scheduler::shutdown`] is called.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("scheduler shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            // Errors are per cycle; the next tick retries from scratch.
            match self.aggregator.update().await {
                Ok(CycleOutcome::Published { .. } | CycleOutcome::Skipped) => {}
                Err(e) => error!("update cycle failed, keeping previous values: {e}"),
            }
        }
    }
}
