//! Prometheus-based monitoring of pipeline runs.
//!
//! Records stage durations, run outcomes, quality-gate decisions and dataset
//! sizes.
//!
//! # Example
//!
//! ```ignore
//! use resume_pipeline::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! let collector = MetricsCollector::new();
//! collector.record_stage("extraction_step", true, 3.2);
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    DATASET_ROWS, QUALITY_GATE_TOTAL, REGISTRY, RUNS_TOTAL, STAGES_TOTAL, STAGE_DURATION,
};
