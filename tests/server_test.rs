//! HTTP exposition tests against a real listener.

use librechat_metrics::aggregator::MetricsAggregator;
use librechat_metrics::registry::GaugeRegistry;
use librechat_metrics::server;
use librechat_metrics::store::{Collection, MemoryStore};
use mongodb::bson::doc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;

async fn spawn_server(registry: Arc<GaugeRegistry>) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        server::serve(listener, registry, async {
            rx.await.ok();
        })
        .await
        .unwrap();
    });
    (addr, tx)
}

#[tokio::test]
async fn metrics_endpoint_serves_published_gauges() {
    let store = Arc::new(MemoryStore::new());
    store.insert_many(
        Collection::Users,
        [doc! { "provider": "local" }, doc! { "provider": "openid" }],
    );
    let registry = Arc::new(GaugeRegistry::with_catalog().unwrap());
    let aggregator = MetricsAggregator::new(store, Arc::clone(&registry));
    aggregator.update().await.unwrap();

    let (addr, shutdown) = spawn_server(registry).await;

    let resp = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert!(resp.status().is_success());
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"), "got {content_type}");

    let body = resp.text().await.unwrap();
    assert!(body.contains("librechat_user_provider_count{provider=\"local\"} 1"));
    assert!(body.contains("librechat_user_provider_count{provider=\"openid\"} 1"));
    assert!(body.contains("librechat_message_token_sum 0"));

    shutdown.send(()).ok();
}

#[tokio::test]
async fn health_endpoint_is_ok() {
    let registry = Arc::new(GaugeRegistry::with_catalog().unwrap());
    let (addr, shutdown) = spawn_server(registry).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.text().await.unwrap(), "OK");

    shutdown.send(()).ok();
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let registry = Arc::new(GaugeRegistry::new());
    let (addr, shutdown) = spawn_server(registry).await;

    let resp = reqwest::get(format!("http://{addr}/nope")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);

    shutdown.send(()).ok();
}
