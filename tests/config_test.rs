use librechat_metrics::config::Config;
use librechat_metrics::config::secrets::ExposeSecret;
use std::time::Duration;

const VARS: &[&str] = &[
    "MONGO_URI",
    "MONGO_DATABASE",
    "METRICS_ADDR",
    "UPDATE_INTERVAL_SECS",
    "QUERY_TIMEOUT_SECS",
    "OTEL_ENDPOINT",
    "LOG_LEVEL",
];

fn clear() {
    for var in VARS {
        unsafe { std::env::remove_var(var) };
    }
}

fn set(name: &str, value: &str) {
    unsafe { std::env::set_var(name, value) };
}

// Environment variables are process-global, so every case runs in one test.
#[test]
fn config_from_env() {
    // Missing required
    clear();
    assert!(Config::from_env().is_err());

    // Defaults
    set("MONGO_URI", "mongodb://localhost:27017");
    let config = Config::from_env().unwrap();
    assert_eq!(config.mongo_uri.expose_secret(), "mongodb://localhost:27017");
    assert_eq!(config.mongo_database, "LibreChat");
    assert_eq!(config.metrics_addr.port(), 8000);
    assert_eq!(config.update_interval, Duration::from_secs(60));
    assert_eq!(config.query_timeout, Duration::from_secs(10));
    assert!(config.otel_endpoint.is_none());
    assert_eq!(config.log_level, "info");

    // Overrides; empty counts as unset
    set("MONGO_DATABASE", "chat");
    set("METRICS_ADDR", "127.0.0.1:9123");
    set("UPDATE_INTERVAL_SECS", "15");
    set("OTEL_ENDPOINT", "");
    let config = Config::from_env().unwrap();
    assert_eq!(config.mongo_database, "chat");
    assert_eq!(config.metrics_addr.to_string(), "127.0.0.1:9123");
    assert_eq!(config.update_interval, Duration::from_secs(15));
    assert!(config.otel_endpoint.is_none());

    // Malformed values fail fast
    set("UPDATE_INTERVAL_SECS", "0");
    assert!(Config::from_env().is_err());
    set("UPDATE_INTERVAL_SECS", "soon");
    assert!(Config::from_env().is_err());
    set("UPDATE_INTERVAL_SECS", "15");
    set("METRICS_ADDR", "not-an-address");
    assert!(Config::from_env().is_err());

    clear();
}
