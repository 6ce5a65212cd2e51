//! Shared fixtures for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{
    CommonProperties, Components, DataPlotCreationStepProperties, DataProperties,
    DataValidatingStepProperties, DatasetName, DatasetTag, ExtractionStepProperties,
    PipelineConfiguration, PreprocessingStepProperties,
};
use crate::data::{DataController, FileManager, Row};
use crate::pipeline::StepContext;
use crate::publish::{ArtifactLogger, Chart};

/// Builds a row from a JSON object literal.
pub fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

/// A valid configuration with all four datasets declared.
pub fn sample_config() -> PipelineConfiguration {
    PipelineConfiguration {
        common_properties: CommonProperties {
            name: "resume_pipeline".to_string(),
            version: "0.1.0".to_string(),
            provide_artifacts_to_project_dir: false,
            quality_gate_backend_enabled: true,
        },
        components: Components {
            extraction_step_properties: Some(ExtractionStepProperties {
                positions_to_extract: vec!["devops".to_string()],
            }),
            preprocessing_step_properties: Some(PreprocessingStepProperties {
                unmatching_jobs_threshold: 0.5,
            }),
            data_validating_step_properties: Some(DataValidatingStepProperties::default()),
            data_plot_creation_step_properties: Some(DataPlotCreationStepProperties::default()),
        },
        dataset: BTreeMap::new(),
    }
    .with_dataset(
        DatasetName::SourceData,
        DataProperties::new("source", "raw resumes", DatasetTag::Raw)
            .with_custom_property("use_increment", json!(false)),
    )
    .with_dataset(
        DatasetName::PreprocessedData,
        DataProperties::new("preprocessed", "cleaned resumes", DatasetTag::Interim)
            .with_custom_property("minimal_data_rows", json!(10))
            .with_custom_property("target_column", json!("salary"))
            .with_custom_property("bounds", json!([0, 500000]))
            .with_custom_property("z_score_threshold", json!(3.0))
            .with_custom_property("ks_test_p_value", json!(0.05)),
    )
    .with_dataset(
        DatasetName::ProcessedData,
        DataProperties::new("processed", "processed resumes", DatasetTag::Processed),
    )
    .with_dataset(
        DatasetName::VerifiedData,
        DataProperties::new("verified", "verified resumes", DatasetTag::Verified),
    )
}

/// Logger that remembers what was published.
#[derive(Default)]
pub struct RecordingLogger {
    tables: Mutex<Vec<(String, BTreeMap<String, Value>)>>,
    plots: Mutex<HashMap<String, Chart>>,
    plot_order: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn plot_names(&self) -> Vec<String> {
        self.plot_order.lock().unwrap().clone()
    }

    pub fn plot(&self, name: &str) -> Option<Chart> {
        self.plots.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl ArtifactLogger for RecordingLogger {
    async fn publish_dictionary_values(&self, name: &str, values: &BTreeMap<String, Value>) {
        self.tables
            .lock()
            .unwrap()
            .push((name.to_string(), values.clone()));
    }

    async fn publish_plots(&self, plots: &BTreeMap<String, Chart>) {
        for (name, chart) in plots {
            self.plot_order.lock().unwrap().push(name.clone());
            self.plots.lock().unwrap().insert(name.clone(), chart.clone());
        }
    }
}

/// Stage context over `files` with a recording logger.
pub fn context(config: PipelineConfiguration, files: Arc<dyn FileManager>) -> StepContext {
    context_with_logger(config, files, Arc::new(RecordingLogger::default()))
}

pub fn context_with_logger(
    config: PipelineConfiguration,
    files: Arc<dyn FileManager>,
    logger: Arc<dyn ArtifactLogger>,
) -> StepContext {
    let config = Arc::new(config);
    StepContext {
        data: Arc::new(DataController::new(config.clone(), files)),
        config,
        logger,
    }
}
