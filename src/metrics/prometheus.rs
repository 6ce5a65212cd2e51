//! Prometheus metrics registration and export.
//!
//! Defines the metrics recorded by pipeline runs and provides functions for
//! initializing, registering, and exporting them.

use prometheus::{CounterVec, Encoder, GaugeVec, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all pipeline metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Stage execution duration in seconds, labeled by stage.
pub static STAGE_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Total stage executions, labeled by stage and status.
pub static STAGES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Total pipeline runs, labeled by outcome (completed / aborted).
pub static RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Quality gate decisions, labeled by outcome (passed or the error kind).
pub static QUALITY_GATE_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Row count of the last saved version of each dataset.
pub static DATASET_ROWS: OnceLock<GaugeVec> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Safe to call more than once; later calls leave the first registry in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let stage_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "resume_pipeline_stage_duration_seconds",
            "Stage execution duration in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
        &["stage"],
    )?;

    let stages_total = CounterVec::new(
        Opts::new("resume_pipeline_stages_total", "Total stage executions"),
        &["stage", "status"],
    )?;

    let runs_total = CounterVec::new(
        Opts::new("resume_pipeline_runs_total", "Total pipeline runs"),
        &["outcome"],
    )?;

    let quality_gate_total = CounterVec::new(
        Opts::new(
            "resume_pipeline_quality_gate_total",
            "Quality gate decisions by outcome",
        ),
        &["outcome"],
    )?;

    let dataset_rows = GaugeVec::new(
        Opts::new("resume_pipeline_dataset_rows", "Rows in the last saved dataset"),
        &["dataset"],
    )?;

    registry.register(Box::new(stage_duration.clone()))?;
    registry.register(Box::new(stages_total.clone()))?;
    registry.register(Box::new(runs_total.clone()))?;
    registry.register(Box::new(quality_gate_total.clone()))?;
    registry.register(Box::new(dataset_rows.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = STAGE_DURATION.set(stage_duration);
    let _ = STAGES_TOTAL.set(stages_total);
    let _ = RUNS_TOTAL.set(runs_total);
    let _ = QUALITY_GATE_TOTAL.set(quality_gate_total);
    let _ = DATASET_ROWS.set(dataset_rows);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns an explanatory comment line when the registry has not been
/// initialized or encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
        assert!(REGISTRY.get().is_some());
    }

    #[test]
    fn test_metrics_after_init() {
        let _ = init_metrics();

        if let Some(runs) = RUNS_TOTAL.get() {
            runs.with_label_values(&["completed"]).inc();
        }

        let metrics = export_metrics();
        assert!(!metrics.starts_with("# Error"));
        assert!(metrics.contains("resume_pipeline_runs_total"));
    }
}
