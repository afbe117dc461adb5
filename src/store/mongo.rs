//! MongoDB backend for [`DocumentStore`].
//!
//! Every call is wrapped in a timeout so a hung query fails the cycle instead
//! of stalling the scheduler.

use super::{Collection, DocumentStore};
use crate::error::{Error, Result};
use crate::telemetry::metrics;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use mongodb::{Client, Database};
use opentelemetry::KeyValue;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Database handle. The driver's client pools connections internally.
pub struct MongoStore {
    db: Database,
    timeout: Duration,
}

impl MongoStore {
    /// Connect to MongoDB and select `database`.
    ///
    /// The driver connects lazily; use [`MongoStore::health_check`] to verify
    /// the server is reachable.
    pub async fn connect(uri: &str, database: &str, timeout: Duration) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        Ok(Self {
            db: client.database(database),
            timeout,
        })
    }

    /// Run `ping` against the selected database.
    pub async fn health_check(&self) -> Result<()> {
        let db = self.db.clone();
        self.bounded("admin", "ping", async move {
            db.run_command(doc! { "ping": 1 }).await?;
            Ok::<_, Error>(())
        })
        .await
    }

    fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.db.collection(collection.name())
    }

    async fn bounded<T, F>(&self, collection: &str, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                collection: collection.to_string(),
                operation,
                after: self.timeout,
            }),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let attrs = [
            KeyValue::new("collection", collection.to_string()),
            KeyValue::new("operation", operation),
        ];
        metrics::store_queries().add(1, &attrs);
        metrics::store_query_duration_ms().record(elapsed_ms, &attrs);
        debug!(collection, operation, elapsed_ms, ok = result.is_ok(), "store query");

        result
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>> {
        let coll = self.collection(collection);
        self.bounded(collection.name(), "aggregate", async move {
            let cursor = coll.aggregate(pipeline).await?;
            let rows: Vec<Document> = cursor.try_collect().await?;
            Ok::<_, Error>(rows)
        })
        .await
    }

    async fn count_documents(&self, collection: Collection, filter: Document) -> Result<u64> {
        let coll = self.collection(collection);
        self.bounded(collection.name(), "count_documents", async move {
            Ok::<_, Error>(coll.count_documents(filter).await?)
        })
        .await
    }

    async fn find(&self, collection: Collection, filter: Document) -> Result<Vec<Document>> {
        let coll = self.collection(collection);
        self.bounded(collection.name(), "find", async move {
            let cursor = coll.find(filter).await?;
            let docs: Vec<Document> = cursor.try_collect().await?;
            Ok::<_, Error>(docs)
        })
        .await
    }
}
