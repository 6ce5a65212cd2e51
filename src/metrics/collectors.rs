//! High-level recording interface over the raw Prometheus metrics.
//!
//! Every method is a no-op until `init_metrics()` has been called, so library
//! users and tests that never initialise metrics pay nothing.

use super::prometheus::{
    DATASET_ROWS, QUALITY_GATE_TOTAL, RUNS_TOTAL, STAGES_TOTAL, STAGE_DURATION,
};

/// Metrics collector for pipeline runs.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one stage execution.
    ///
    /// * `stage` - stage name (e.g. "validation_step")
    /// * `success` - whether the stage returned normally
    /// * `duration_secs` - wall-clock duration
    pub fn record_stage(&self, stage: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "failure" };

        if let Some(stages_total) = STAGES_TOTAL.get() {
            stages_total.with_label_values(&[stage, status]).inc();
        }

        if let Some(stage_duration) = STAGE_DURATION.get() {
            stage_duration
                .with_label_values(&[stage])
                .observe(duration_secs);
        }

        tracing::trace!(
            stage = stage,
            status = status,
            duration_secs = duration_secs,
            "Recorded stage metric"
        );
    }

    /// Record the terminal state of a run.
    pub fn record_run(&self, completed: bool) {
        let outcome = if completed { "completed" } else { "aborted" };
        if let Some(runs_total) = RUNS_TOTAL.get() {
            runs_total.with_label_values(&[outcome]).inc();
        }
    }

    /// Record a quality gate decision.
    ///
    /// * `outcome` - "passed" or the error kind of the failing result
    pub fn record_quality_gate(&self, outcome: &str) {
        if let Some(gate_total) = QUALITY_GATE_TOTAL.get() {
            gate_total.with_label_values(&[outcome]).inc();
        }
    }

    /// Record the row count of a saved dataset.
    pub fn record_dataset_rows(&self, dataset: &str, rows: usize) {
        if let Some(dataset_rows) = DATASET_ROWS.get() {
            dataset_rows.with_label_values(&[dataset]).set(rows as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{export_metrics, init_metrics};

    #[test]
    fn test_recording_before_and_after_init() {
        let collector = MetricsCollector::new();
        collector.record_stage("extraction_step", true, 0.2);

        init_metrics().unwrap();
        collector.record_stage("validation_step", false, 1.5);
        collector.record_quality_gate("BAD_DATA_QUALITY");
        collector.record_dataset_rows("preprocessed_data", 42);
        collector.record_run(false);

        let exported = export_metrics();
        assert!(exported.contains("resume_pipeline_stage_duration_seconds"));
        assert!(exported.contains("BAD_DATA_QUALITY"));
        assert!(exported.contains("preprocessed_data"));
    }
}
