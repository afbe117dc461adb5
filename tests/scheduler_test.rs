//! Scheduler loop tests.

use librechat_metrics::aggregator::MetricsAggregator;
use librechat_metrics::catalog;
use librechat_metrics::registry::GaugeRegistry;
use librechat_metrics::scheduler::Scheduler;
use librechat_metrics::store::{Collection, MemoryStore};
use mongodb::bson::doc;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn runs_cycles_until_shutdown() {
    let store = Arc::new(MemoryStore::new());
    store.insert(Collection::Messages, doc! { "tokenCount": 4 });
    let registry = Arc::new(GaugeRegistry::with_catalog().unwrap());
    let aggregator = Arc::new(MetricsAggregator::new(store.clone(), Arc::clone(&registry)));

    let scheduler = Scheduler::new(aggregator, Duration::from_millis(20));
    let handle = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.run().await })
    };

    let sum = catalog::MESSAGE_TOKEN_SUM.name;
    // First tick fires immediately.
    wait_for(|| registry.value(sum, &[]).unwrap() == Some(4.0)).await;

    // Later ticks pick up new data.
    store.insert(Collection::Messages, doc! { "tokenCount": 6 });
    wait_for(|| registry.value(sum, &[]).unwrap() == Some(10.0)).await;

    scheduler.shutdown();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}
