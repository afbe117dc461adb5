//! Gauge registry backing the `/metrics` exposition.
//!
//! Every gauge is a Prometheus `GaugeVec`; scalar gauges are vectors with no
//! label keys, so `reset` behaves the same for both kinds. Writers publish a
//! whole cycle through [`GaugeRegistry::apply`], which validates the batch and
//! then writes it under an exclusive lock. Readers (`encode`, `series`,
//! `value`) take the shared lock and therefore never observe a half-applied
//! batch.

use crate::error::{Error, Result};
use prometheus::core::Collector;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// One write produced by an update cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum GaugeUpdate {
    /// Overwrite a scalar gauge.
    Set { name: &'static str, value: f64 },
    /// Reset a labeled gauge, then set exactly these series.
    Replace {
        name: &'static str,
        series: Vec<(Vec<String>, f64)>,
    },
}

impl GaugeUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Set { name, .. } | Self::Replace { name, .. } => name,
        }
    }
}

struct Entry {
    label_keys: Vec<String>,
    gauge: GaugeVec,
}

/// Named gauges plus the Prometheus registry they are exposed through.
pub struct GaugeRegistry {
    registry: Registry,
    gauges: RwLock<HashMap<String, Entry>>,
}

impl Default for GaugeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            gauges: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with every gauge from [`crate::catalog::CATALOG`] defined.
    pub fn with_catalog() -> Result<Self> {
        let registry = Self::new();
        for spec in crate::catalog::CATALOG {
            registry.define(spec.name, spec.help, spec.labels)?;
        }
        Ok(registry)
    }

    /// Register a gauge. Fails with [`Error::DuplicateMetric`] if `name` is taken.
    pub fn define(&self, name: &str, help: &str, label_keys: &[&str]) -> Result<()> {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        if gauges.contains_key(name) {
            return Err(Error::DuplicateMetric(name.to_string()));
        }

        let gauge = GaugeVec::new(Opts::new(name, help), label_keys)?;
        self.registry
            .register(Box::new(gauge.clone()))
            .map_err(|e| match e {
                prometheus::Error::AlreadyReg => Error::DuplicateMetric(name.to_string()),
                other => Error::Prometheus(other),
            })?;

        gauges.insert(
            name.to_string(),
            Entry {
                label_keys: label_keys.iter().map(|k| k.to_string()).collect(),
                gauge,
            },
        );
        Ok(())
    }

    /// Record `value` for one label combination, creating it if absent.
    pub fn set(&self, name: &str, label_values: &[&str], value: f64) -> Result<()> {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        let entry = lookup(&gauges, name, label_values.len())?;
        entry.gauge.with_label_values(label_values).set(value);
        Ok(())
    }

    /// Drop every label combination of `name`.
    pub fn reset(&self, name: &str) -> Result<()> {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        let entry = gauges
            .get(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))?;
        entry.gauge.reset();
        Ok(())
    }

    /// Publish a batch atomically with respect to readers.
    ///
    /// The whole batch is checked first; if any update names an unknown gauge
    /// or carries the wrong number of label values, nothing is written.
    pub fn apply(&self, updates: &[GaugeUpdate]) -> Result<()> {
        let gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);

        for update in updates {
            match update {
                GaugeUpdate::Set { name, .. } => {
                    lookup(&gauges, name, 0)?;
                }
                GaugeUpdate::Replace { name, series } => {
                    let entry = gauges
                        .get(*name)
                        .ok_or_else(|| Error::UnknownMetric(name.to_string()))?;
                    for (labels, _) in series {
                        check_arity(name, entry, labels.len())?;
                    }
                }
            }
        }

        for update in updates {
            match update {
                GaugeUpdate::Set { name, value } => {
                    gauges[*name].gauge.with_label_values(&[]).set(*value);
                }
                GaugeUpdate::Replace { name, series } => {
                    let gauge = &gauges[*name].gauge;
                    gauge.reset();
                    for (labels, value) in series {
                        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                        gauge.with_label_values(&labels).set(*value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Current value of one series, if it is exposed.
    pub fn value(&self, name: &str, label_values: &[&str]) -> Result<Option<f64>> {
        Ok(self
            .series(name)?
            .into_iter()
            .find(|(labels, _)| labels.iter().map(String::as_str).eq(label_values.iter().copied()))
            .map(|(_, value)| value))
    }

    /// Every exposed series of `name`, label values in definition order.
    pub fn series(&self, name: &str) -> Result<Vec<(Vec<String>, f64)>> {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        let entry = gauges
            .get(name)
            .ok_or_else(|| Error::UnknownMetric(name.to_string()))?;

        let mut series: Vec<(Vec<String>, f64)> = entry
            .gauge
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .map(|metric| {
                let pairs = metric.get_label();
                let labels = entry
                    .label_keys
                    .iter()
                    .map(|key| {
                        pairs
                            .iter()
                            .find(|p| p.get_name() == key)
                            .map(|p| p.get_value().to_string())
                            .unwrap_or_default()
                    })
                    .collect();
                (labels, metric.get_gauge().get_value())
            })
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(series)
    }

    /// Names of every defined gauge, sorted.
    pub fn names(&self) -> Vec<String> {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = gauges.keys().cloned().collect();
        names.sort();
        names
    }

    /// Render all gauges in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String> {
        let _gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Other(format!("exposition is not utf-8: {e}")))
    }
}

fn lookup<'a>(gauges: &'a HashMap<String, Entry>, name: &str, arity: usize) -> Result<&'a Entry> {
    let entry = gauges
        .get(name)
        .ok_or_else(|| Error::UnknownMetric(name.to_string()))?;
    check_arity(name, entry, arity)?;
    Ok(entry)
}

fn check_arity(name: &str, entry: &Entry, got: usize) -> Result<()> {
    if entry.label_keys.len() == got {
        Ok(())
    } else {
        Err(Error::LabelMismatch {
            name: name.to_string(),
            expected: entry.label_keys.len(),
            got,
        })
    }
}
