//! Pipeline controller.
//!
//! The controller assembles the four stages into an ordered procedure,
//! threading each stage's result into the next. Backend differences live
//! entirely in the [`StepAdapter`] it is built with.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::PipelineConfiguration;
use crate::data::{DataAccess, DataController, FileManager};
use crate::error::PipelineError;
use crate::metrics::MetricsCollector;
use crate::publish::ArtifactLogger;
use crate::validation::ValidationResult;

use super::results::{ExtractionResult, PreprocessingResult, ReportingResult};
use super::step::{RunnableStep, Step, StepAdapter, StepContext, StepKind, StepValue};

/// The four stage implementations of a pipeline.
#[derive(Clone)]
pub struct PipelineSteps {
    pub extraction: Arc<dyn Step<(), ExtractionResult>>,
    pub preprocessing: Arc<dyn Step<ExtractionResult, PreprocessingResult>>,
    pub validation: Arc<dyn Step<PreprocessingResult, ValidationResult>>,
    pub reporting: Arc<dyn Step<PreprocessingResult, ReportingResult>>,
}

impl PipelineSteps {
    pub fn new(
        extraction: Arc<dyn Step<(), ExtractionResult>>,
        preprocessing: Arc<dyn Step<ExtractionResult, PreprocessingResult>>,
        validation: Arc<dyn Step<PreprocessingResult, ValidationResult>>,
        reporting: Arc<dyn Step<PreprocessingResult, ReportingResult>>,
    ) -> Self {
        Self {
            extraction,
            preprocessing,
            validation,
            reporting,
        }
    }

    /// Builder method to replace the extraction stage.
    pub fn with_extraction(mut self, step: Arc<dyn Step<(), ExtractionResult>>) -> Self {
        self.extraction = step;
        self
    }

    /// Builder method to replace the preprocessing stage.
    pub fn with_preprocessing(
        mut self,
        step: Arc<dyn Step<ExtractionResult, PreprocessingResult>>,
    ) -> Self {
        self.preprocessing = step;
        self
    }

    /// Builder method to replace the validation stage.
    pub fn with_validation(
        mut self,
        step: Arc<dyn Step<PreprocessingResult, ValidationResult>>,
    ) -> Self {
        self.validation = step;
        self
    }

    /// Builder method to replace the reporting stage.
    pub fn with_reporting(
        mut self,
        step: Arc<dyn Step<PreprocessingResult, ReportingResult>>,
    ) -> Self {
        self.reporting = step;
        self
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub completed_steps: Vec<StepKind>,
    pub reporting: ReportingResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A procedure that runs the whole pipeline.
#[async_trait]
pub trait RunnablePipeline: Send + Sync {
    async fn run(&self) -> Result<RunReport, PipelineError>;
}

/// Builds runnable pipelines from stages and a backend adapter.
pub struct PipelineController<A: StepAdapter> {
    config: PipelineConfiguration,
    adapter: A,
    steps: PipelineSteps,
    file_manager: Arc<dyn FileManager>,
    logger: Arc<dyn ArtifactLogger>,
}

impl<A: StepAdapter> PipelineController<A> {
    pub fn new(
        config: PipelineConfiguration,
        adapter: A,
        steps: PipelineSteps,
        file_manager: Arc<dyn FileManager>,
        logger: Arc<dyn ArtifactLogger>,
    ) -> Self {
        Self {
            config,
            adapter,
            steps,
            file_manager,
            logger,
        }
    }

    /// Default configuration of the pipeline.
    pub fn config(&self) -> &PipelineConfiguration {
        &self.config
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Wraps every stage with the adapter and returns the runnable procedure.
    pub fn assemble(&self) -> AssembledPipeline {
        AssembledPipeline {
            config: self.config.clone(),
            extraction: self.adapter.wrap(self.steps.extraction.clone()),
            preprocessing: self.adapter.wrap(self.steps.preprocessing.clone()),
            validation: self.adapter.wrap(self.steps.validation.clone()),
            reporting: self.adapter.wrap(self.steps.reporting.clone()),
            file_manager: self.file_manager.clone(),
            logger: self.logger.clone(),
            metrics: MetricsCollector::new(),
        }
    }
}

/// Stage sequence with every stage decorated for its backend.
pub struct AssembledPipeline {
    config: PipelineConfiguration,
    extraction: RunnableStep<(), ExtractionResult>,
    preprocessing: RunnableStep<ExtractionResult, PreprocessingResult>,
    validation: RunnableStep<PreprocessingResult, ValidationResult>,
    reporting: RunnableStep<PreprocessingResult, ReportingResult>,
    file_manager: Arc<dyn FileManager>,
    logger: Arc<dyn ArtifactLogger>,
    metrics: MetricsCollector,
}

impl AssembledPipeline {
    /// Default configuration the pipeline was assembled with.
    pub fn config(&self) -> &PipelineConfiguration {
        &self.config
    }

    /// Runs all stages with `config` instead of the assembled default.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Config` if `config` does not validate
    /// - `PipelineError::ValidationFailed` if the quality gate rejects the data
    /// - `PipelineError::StageFailed` if a stage returns an error
    pub async fn run_with_config(
        &self,
        config: PipelineConfiguration,
    ) -> Result<RunReport, PipelineError> {
        config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let pipeline = config.common_properties.name.clone();
        info!(run_id = %run_id, pipeline = %pipeline, "Pipeline run started");

        let config = Arc::new(config);
        let data: Arc<dyn DataAccess> =
            Arc::new(DataController::new(config.clone(), self.file_manager.clone()));
        let ctx = StepContext {
            config,
            data,
            logger: self.logger.clone(),
        };

        let mut completed_steps = Vec::with_capacity(StepKind::ALL.len());
        let outcome = self.execute(&ctx, &mut completed_steps).await;
        self.metrics.record_run(outcome.is_ok());

        match outcome {
            Ok(reporting) => {
                info!(run_id = %run_id, pipeline = %pipeline, "Pipeline run completed");
                Ok(RunReport {
                    run_id,
                    pipeline,
                    completed_steps,
                    reporting,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(e) => {
                error!(run_id = %run_id, pipeline = %pipeline, error = %e, "Pipeline run aborted");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &StepContext,
        completed: &mut Vec<StepKind>,
    ) -> Result<ReportingResult, PipelineError> {
        let extraction = self
            .run_stage(StepKind::Extraction, &self.extraction, ctx, ())
            .await?;
        completed.push(StepKind::Extraction);

        let preprocessing = self
            .run_stage(StepKind::Preprocessing, &self.preprocessing, ctx, extraction)
            .await?;
        completed.push(StepKind::Preprocessing);

        let validation = self
            .run_stage(StepKind::Validation, &self.validation, ctx, preprocessing.clone())
            .await?;
        if let Some(kind) = validation.error() {
            error!(
                error = %kind,
                reason = %validation.message(),
                "Data validation failed"
            );
            self.metrics.record_quality_gate(kind.as_str());
            return Err(PipelineError::ValidationFailed {
                error: kind,
                message: validation.message().to_string(),
            });
        }
        self.metrics.record_quality_gate("passed");
        completed.push(StepKind::Validation);

        let reporting = self
            .run_stage(StepKind::Reporting, &self.reporting, ctx, preprocessing)
            .await?;
        completed.push(StepKind::Reporting);

        Ok(reporting)
    }

    async fn run_stage<I, O>(
        &self,
        kind: StepKind,
        step: &RunnableStep<I, O>,
        ctx: &StepContext,
        input: I,
    ) -> Result<O, PipelineError>
    where
        I: StepValue,
        O: StepValue,
    {
        info!(stage = %kind, "Stage started");
        let started = Instant::now();
        let result = (**step)(ctx.clone(), input).await;
        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.record_stage(kind.name(), result.is_ok(), elapsed);

        match result {
            Ok(output) => {
                info!(stage = %kind, duration_secs = elapsed, "Stage finished");
                Ok(output)
            }
            Err(source) => {
                error!(stage = %kind, duration_secs = elapsed, error = %source, "Stage failed");
                Err(PipelineError::StageFailed {
                    stage: kind,
                    source,
                })
            }
        }
    }
}

#[async_trait]
impl RunnablePipeline for AssembledPipeline {
    async fn run(&self) -> Result<RunReport, PipelineError> {
        self.run_with_config(self.config.clone()).await
    }
}
