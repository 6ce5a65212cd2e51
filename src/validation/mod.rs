//! Data-quality gate.
//!
//! The gate compares the preprocessed candidate dataset with a trusted
//! reference dataset and returns a single [`ValidationResult`]:
//!
//! 1. **Custom metrics** (`custom_metrics`): minimum row count, presence of
//!    the target column and integer target values. Any failure yields
//!    `BAD_DATA_QUALITY`.
//! 2. **Distribution checks** (`distribution`): bounds, optional KL
//!    divergence, z-score outliers and a two-sample Kolmogorov-Smirnov test
//!    on the number of skills per resume. The first failing check decides
//!    the error kind.
//!
//! Thresholds come from the candidate dataset's custom properties
//! (`parameters`). Data problems never raise; only malformed configuration
//! does.

pub mod custom_metrics;
pub mod distribution;
pub mod engine;
pub mod parameters;
pub mod result;
pub mod statistics;

pub use custom_metrics::{CustomMetricsReport, CustomMetricsValidator};
pub use distribution::{
    BoundsCheck, CheckFailure, CheckInput, DistributionCheck, KlDivergenceCheck, KsTestCheck,
    ZScoreCheck, FEATURE_COUNT_COLUMN,
};
pub use engine::{count_separators, ValidationEngine};
pub use parameters::DistributionParameters;
pub use result::{DatasetValidationError, InvalidValidationResult, ValidationResult};
