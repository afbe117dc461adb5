//! Tests against MongoDB.
//!
//! Only the timeout test runs without a server. Run the rest with:
//! ```sh
//! MONGO_URI=mongodb://localhost:27017 cargo test --test mongo_test -- --ignored
//! ```

use librechat_metrics::aggregator::{CycleOutcome, MetricsAggregator};
use librechat_metrics::catalog;
use librechat_metrics::error::Error;
use librechat_metrics::registry::GaugeRegistry;
use librechat_metrics::store::{Collection, DocumentStore, MongoStore};
use mongodb::bson::doc;
use std::sync::Arc;
use std::time::Duration;

/// Helper: connect to a throwaway database.
/// Requires MONGO_URI env var or defaults to local dev.
async fn test_store() -> MongoStore {
    let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    MongoStore::connect(&uri, "librechat_metrics_test", Duration::from_secs(10))
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Requires running MongoDB
async fn connects_and_pings() {
    let store = test_store().await;
    assert!(store.health_check().await.is_ok());
}

#[tokio::test]
#[ignore] // Requires running MongoDB
async fn queries_run_against_empty_collections() {
    let store = test_store().await;

    let rows = store
        .aggregate(
            Collection::Files,
            vec![doc! { "$match": { "bytes": { "$lt": 0 } } }],
        )
        .await
        .unwrap();
    assert!(rows.is_empty());

    let count = store
        .count_documents(Collection::Banners, doc! { "displayFrom": { "$exists": false, "$lt": 0 } })
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[ignore] // Requires running MongoDB
async fn full_cycle_publishes_every_scalar() {
    let store = test_store().await;
    let registry = Arc::new(GaugeRegistry::with_catalog().unwrap());
    let aggregator = MetricsAggregator::new(Arc::new(store), Arc::clone(&registry));

    let outcome = aggregator.update().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Published { .. }));

    for spec in catalog::CATALOG.iter().filter(|s| s.labels.is_empty()) {
        assert!(
            registry.value(spec.name, &[]).unwrap().is_some(),
            "{} was not published",
            spec.name
        );
    }
}

#[tokio::test]
async fn unreachable_server_times_out_and_leaves_gauges_untouched() {
    // Nothing listens on port 1, so server selection stalls until our bound.
    let store = MongoStore::connect("mongodb://127.0.0.1:1", "librechat_metrics_test", Duration::from_millis(200))
        .await
        .unwrap();
    let registry = Arc::new(GaugeRegistry::with_catalog().unwrap());
    let aggregator = MetricsAggregator::new(Arc::new(store), Arc::clone(&registry));

    let started = std::time::Instant::now();
    let err = aggregator.update().await.unwrap_err();

    assert!(
        matches!(err, Error::Timeout { ref collection, .. } if collection == "messages"),
        "got {err}"
    );
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(registry.value(catalog::MESSAGE_TOKEN_SUM.name, &[]).unwrap(), None);
}
