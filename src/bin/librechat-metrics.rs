//! librechat-metrics CLI: serve LibreChat usage gauges to Prometheus.

use clap::{Parser, Subcommand};
use librechat_metrics::aggregator::{CycleOutcome, MetricsAggregator};
use librechat_metrics::catalog::CATALOG;
use librechat_metrics::config::Config;
use librechat_metrics::config::secrets::ExposeSecret;
use librechat_metrics::registry::GaugeRegistry;
use librechat_metrics::scheduler::Scheduler;
use librechat_metrics::server;
use librechat_metrics::store::MongoStore;
use librechat_metrics::telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "librechat-metrics",
    about = "Prometheus exporter for LibreChat usage metrics"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the exporter: update gauges periodically and serve /metrics
    Serve {
        /// Seconds between update cycles (overrides UPDATE_INTERVAL_SECS)
        #[arg(long)]
        interval: Option<u64>,
        /// Listen address (overrides METRICS_ADDR)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },
    /// Run a single update cycle and print the result
    Once {
        /// Print JSON instead of the Prometheus text format
        #[arg(long)]
        json: bool,
    },
    /// Check that the database is reachable
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { interval, addr } => cmd_serve(interval, addr).await,
        Command::Once { json } => cmd_once(json).await,
        Command::Check => cmd_check().await,
    }
}

async fn connect(config: &Config) -> anyhow::Result<MongoStore> {
    let store = MongoStore::connect(
        config.mongo_uri.expose_secret(),
        &config.mongo_database,
        config.query_timeout,
    )
    .await?;
    Ok(store)
}

fn telemetry(config: &Config) -> anyhow::Result<TelemetryGuard> {
    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "librechat-metrics".to_string(),
        default_filter: config.log_level.clone(),
    })?;
    Ok(guard)
}

async fn cmd_serve(interval: Option<u64>, addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = telemetry(&config)?;

    let interval = match interval {
        Some(0) => anyhow::bail!("--interval must be greater than zero"),
        Some(secs) => Duration::from_secs(secs),
        None => config.update_interval,
    };
    let addr = addr.unwrap_or(config.metrics_addr);

    let store = connect(&config).await?;
    let registry = Arc::new(GaugeRegistry::with_catalog()?);
    let aggregator = Arc::new(MetricsAggregator::new(
        Arc::new(store),
        Arc::clone(&registry),
    ));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        database = %config.mongo_database,
        interval_secs = interval.as_secs(),
        "starting librechat-metrics"
    );

    let scheduler = Scheduler::new(aggregator, interval);
    let sched = scheduler.clone();
    let scheduler_task = tokio::spawn(async move { sched.run().await });

    let shutdown = {
        let sched = scheduler.clone();
        async move {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
            sched.shutdown();
        }
    };

    let served = server::serve(listener, registry, shutdown).await;
    scheduler.shutdown();
    if let Err(e) = scheduler_task.await {
        error!("scheduler task failed: {e}");
    }
    served?;
    Ok(())
}

#[derive(Serialize)]
struct SeriesJson {
    labels: BTreeMap<&'static str, String>,
    value: f64,
}

async fn cmd_once(json: bool) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = telemetry(&config)?;
    let store = connect(&config).await?;
    let registry = Arc::new(GaugeRegistry::with_catalog()?);
    let aggregator = MetricsAggregator::new(Arc::new(store), Arc::clone(&registry));

    if let CycleOutcome::Skipped = aggregator.update().await? {
        anyhow::bail!("update cycle was skipped");
    }

    if !json {
        print!("{}", registry.encode()?);
        return Ok(());
    }

    let mut out: BTreeMap<&'static str, Vec<SeriesJson>> = BTreeMap::new();
    for spec in CATALOG {
        let series = registry
            .series(spec.name)?
            .into_iter()
            .map(|(values, value)| SeriesJson {
                labels: spec.labels.iter().copied().zip(values).collect(),
                value,
            })
            .collect();
        out.insert(spec.name, series);
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn cmd_check() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = telemetry(&config)?;
    let store = connect(&config).await?;
    store.health_check().await?;
    println!("OK: connected to database '{}'", config.mongo_database);
    Ok(())
}
