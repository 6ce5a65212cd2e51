//! Structural checks of the candidate dataset (first layer of the gate).
//!
//! Each metric is a named predicate over the dataset and its custom
//! properties. All metrics are evaluated before the verdict is taken; a
//! metric that cannot be computed fails the whole layer.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::data::{is_missing, Dataset};

use super::parameters::{required_str, required_u64};

/// A named structural predicate.
pub type MetricFn = Box<dyn Fn(&Dataset, &Map<String, Value>) -> anyhow::Result<bool> + Send + Sync>;

/// Result of evaluating every metric.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomMetricsReport {
    pub success: bool,
    pub message: String,
    /// Individual outcomes; `None` when a metric could not be computed.
    pub results: Option<BTreeMap<String, bool>>,
}

/// Evaluates a fixed set of named metrics against a dataset.
pub struct CustomMetricsValidator {
    metrics: Vec<(String, MetricFn)>,
}

impl Default for CustomMetricsValidator {
    fn default() -> Self {
        Self::new()
            .with_metric("minimal_data", |data, params| {
                Ok(data.len() as u64 >= required_u64(params, "minimal_data_rows")?)
            })
            .with_metric("columns_constraint", |data, params| {
                Ok(data.has_column(required_str(params, "target_column")?))
            })
            .with_metric("numeric_instance", |data, params| {
                let target = required_str(params, "target_column")?;
                if !data.has_column(target) {
                    anyhow::bail!("column '{}' is absent", target);
                }
                Ok(data
                    .column(target)
                    .filter(|cell| !is_missing(*cell))
                    .all(|cell| cell.is_some_and(|v| v.is_i64() || v.is_u64())))
            })
    }
}

impl CustomMetricsValidator {
    /// Creates a validator without metrics.
    pub fn new() -> Self {
        Self {
            metrics: Vec::new(),
        }
    }

    /// Builder method to add a metric.
    pub fn with_metric<F>(mut self, name: impl Into<String>, metric: F) -> Self
    where
        F: Fn(&Dataset, &Map<String, Value>) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.metrics.push((name.into(), Box::new(metric)));
        self
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn validate(&self, data: &Dataset, parameters: &Map<String, Value>) -> CustomMetricsReport {
        let mut results = BTreeMap::new();
        let mut first_error = None;

        for (name, metric) in &self.metrics {
            match metric(data, parameters) {
                Ok(passed) => {
                    results.insert(name.clone(), passed);
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(format!("{}: {}", name, e));
                    }
                }
            }
        }

        if let Some(error) = first_error {
            return CustomMetricsReport {
                success: false,
                message: format!("Error while computing metrics: {}", error),
                results: None,
            };
        }

        debug!(results = ?results, "Custom metrics evaluated");

        if results.values().all(|passed| *passed) {
            CustomMetricsReport {
                success: true,
                message: String::new(),
                results: Some(results),
            }
        } else {
            let failed: Vec<&str> = results
                .iter()
                .filter(|(_, passed)| !**passed)
                .map(|(name, _)| name.as_str())
                .collect();
            CustomMetricsReport {
                success: false,
                message: format!("Metrics not passed: {}", failed.join(", ")),
                results: Some(results),
            }
        }
    }
}
