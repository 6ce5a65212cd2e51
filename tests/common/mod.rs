//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use resume_pipeline::config::{
    CommonProperties, Components, DataPlotCreationStepProperties, DataProperties,
    DataValidatingStepProperties, DatasetName, DatasetTag, ExtractionStepProperties,
    PipelineConfiguration, PreprocessingStepProperties,
};
use resume_pipeline::data::{Dataset, Row};
use resume_pipeline::pipeline::{
    ExtractionResult, PipelineSteps, PreprocessingResult, ReportingResult, Step, StepContext,
    StepKind, StepValue,
};
use resume_pipeline::validation::ValidationResult;

pub fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

pub fn config() -> PipelineConfiguration {
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
        DatasetName::VerifiedData,
        DataProperties::new("verified", "verified resumes", DatasetTag::Verified),
    )
}

pub const SKILLS: [&str; 3] = ["Linux", "Linux, Docker", "Linux, Docker, Kubernetes"];

/// Preprocessed-looking resumes with integer salaries.
pub fn resumes(count: usize, salary: impl Fn(usize) -> u64) -> Dataset {
    Dataset::from_rows(
        (0..count)
            .map(|i| row(json!({"salary": salary(i), "age": 30 + (i % 10), "skills": SKILLS[i % 3]})))
            .collect(),
    )
}

pub fn reference() -> Dataset {
    resumes(30, |i| 60000 + (i as u64 % 5) * 10000)
}

type StepFn<I, O> = Box<dyn Fn(&StepContext, I) -> anyhow::Result<O> + Send + Sync>;

/// Step that counts its calls and delegates to a closure.
pub struct SpyStep<I, O> {
    kind: StepKind,
    calls: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<Value>>>,
    body: StepFn<I, O>,
}

impl<I, O> SpyStep<I, O>
where
    I: StepValue,
    O: StepValue,
{
    pub fn new<F>(kind: StepKind, body: F) -> Arc<Self>
    where
        F: Fn(&StepContext, I) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        Arc::new(Self {
            kind,
            calls: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
            body: Box::new(body),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inputs received so far, as JSON.
    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl<I, O> Step<I, O> for SpyStep<I, O>
where
    I: StepValue,
    O: StepValue,
{
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn run(&self, ctx: StepContext, input: I) -> anyhow::Result<O> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs
            .lock()
            .unwrap()
            .push(serde_json::to_value(&input).unwrap());
        (self.body)(&ctx, input)
    }
}

pub struct Spies {
    pub extraction: Arc<SpyStep<(), ExtractionResult>>,
    pub preprocessing: Arc<SpyStep<ExtractionResult, PreprocessingResult>>,
    pub validation: Arc<SpyStep<PreprocessingResult, ValidationResult>>,
    pub reporting: Arc<SpyStep<PreprocessingResult, ReportingResult>>,
}

impl Spies {
    /// Spies that succeed; validation returns `validation`.
    pub fn with_validation(validation: ValidationResult) -> Self {
        Self {
            extraction: SpyStep::new(StepKind::Extraction, |_, _| {
                Ok(ExtractionResult::new(DatasetName::SourceData))
            }),
            preprocessing: SpyStep::new(StepKind::Preprocessing, |_, _| {
                Ok(PreprocessingResult::new(DatasetName::PreprocessedData))
            }),
            validation: SpyStep::new(StepKind::Validation, move |_, _| Ok(validation.clone())),
            reporting: SpyStep::new(StepKind::Reporting, |_, _| {
                Ok(ReportingResult::new(true))
            }),
        }
    }

    pub fn steps(&self) -> PipelineSteps {
        PipelineSteps::new(
            self.extraction.clone(),
            self.preprocessing.clone(),
            self.validation.clone(),
            self.reporting.clone(),
        )
    }
}
