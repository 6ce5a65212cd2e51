//! Stage components.
//!
//! - **extraction**: fetches resumes per searched position into `source_data`
//! - **preprocessing**: cleans today's increment into `preprocessed_data`
//! - **validating**: runs the quality gate against the reference dataset
//! - **reporting**: publishes charts and a summary of the preprocessed data
//! - **classifier**: position matching used by preprocessing

pub mod classifier;
pub mod extraction;
pub mod preprocessing;
pub mod reporting;
pub mod validating;

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::{Map, Value};

use crate::config::{ConfigError, DatasetName};
use crate::data::DataAccess;
use crate::error::DataError;

use super::controller::PipelineSteps;

pub use classifier::{ClassifierProvider, PositionClassifier, TokenOverlapClassifier, TokenOverlapProvider};
pub use extraction::{ExtractionStep, JsonDumpSource, ResumeSource};
pub use preprocessing::PreprocessingStep;
pub use reporting::ReportingStep;
pub use validating::ValidatingStep;

/// Position the resume was found for.
pub const SEARCHED_POSITION_COLUMN: &str = "searched_position";
/// Position the candidate is looking for, as written in the resume.
pub const DESIRED_POSITION_COLUMN: &str = "desired_position";
pub const SALARY_COLUMN: &str = "salary";
pub const AGE_COLUMN: &str = "age";
/// Date the resume was last updated on the source (`YYYY-MM-DD`).
pub const RESUME_UPDATED_COLUMN: &str = "resume_updated_at";

/// Current local date, as stamped into the extraction date column.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Custom properties of a dataset; a configuration error when absent.
pub(crate) fn dataset_custom_properties(
    data: &dyn DataAccess,
    name: DatasetName,
) -> Result<Map<String, Value>, DataError> {
    data.get_dataset_parameters(name)?
        .custom_properties
        .ok_or_else(|| ConfigError::MissingCustomProperties(name).into())
}

impl PipelineSteps {
    /// The production stages over a resume source and a classifier.
    pub fn standard(
        source: Arc<dyn ResumeSource>,
        classifier: Arc<dyn ClassifierProvider>,
    ) -> Self {
        Self::new(
            Arc::new(ExtractionStep::new(source)),
            Arc::new(PreprocessingStep::new(classifier)),
            Arc::new(ValidatingStep::new()),
            Arc::new(ReportingStep::new()),
        )
    }
}
