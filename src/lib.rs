//! # librechat-metrics
//!
//! Periodically aggregates a LibreChat MongoDB store into Prometheus gauges.
//!
//! The [`aggregator`] runs a fixed list of read-only queries per cycle and
//! publishes the results into a [`registry::GaugeRegistry`], which the
//! [`server`] exposes at `/metrics`. The [`scheduler`] drives cycles on a
//! fixed interval.

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod error;
pub mod registry;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod telemetry;
