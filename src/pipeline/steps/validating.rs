//! Validation stage: runs the quality gate on the preprocessed dataset.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::pipeline::results::PreprocessingResult;
use crate::pipeline::step::{Step, StepContext, StepKind};
use crate::validation::{ValidationEngine, ValidationResult};

use super::dataset_custom_properties;

/// Builds the engine for a run from the quality gate switch.
pub type EngineFactory = Box<dyn Fn(bool) -> ValidationEngine + Send + Sync>;

pub struct ValidatingStep {
    engine: EngineFactory,
}

impl Default for ValidatingStep {
    fn default() -> Self {
        Self {
            engine: Box::new(|distribution_checks| {
                ValidationEngine::new().with_distribution_checks(distribution_checks)
            }),
        }
    }
}

impl ValidatingStep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to customize the engine.
    pub fn with_engine<F>(mut self, engine: F) -> Self
    where
        F: Fn(bool) -> ValidationEngine + Send + Sync + 'static,
    {
        self.engine = Box::new(engine);
        self
    }
}

#[async_trait]
impl Step<PreprocessingResult, ValidationResult> for ValidatingStep {
    fn kind(&self) -> StepKind {
        StepKind::Validation
    }

    async fn run(
        &self,
        ctx: StepContext,
        input: PreprocessingResult,
    ) -> anyhow::Result<ValidationResult> {
        let properties = ctx.config.components.validating()?;
        let dataset_name = input
            .preprocessed_data()
            .context("preprocessing result has no preprocessed_data entry")?;
        let parameters = dataset_custom_properties(ctx.data.as_ref(), dataset_name)?;

        let candidate = ctx.data.get_dataset(dataset_name).await?;
        let reference = ctx.data.get_dataset(properties.reference_dataset).await?;

        let engine = (self.engine)(ctx.config.common_properties.quality_gate_backend_enabled);
        let result = engine.validate(&candidate, &reference, &parameters)?;

        let mut summary: BTreeMap<String, Value> = parameters.into_iter().collect();
        summary.insert("success".to_string(), Value::from(result.is_success()));
        summary.insert("error".to_string(), Value::from(result.error_message()));
        ctx.logger
            .publish_dictionary_values("data_validating_step_parameters", &summary)
            .await;

        info!(
            dataset = %dataset_name,
            reference = %properties.reference_dataset,
            candidate_rows = candidate.len(),
            success = result.is_success(),
            "Validation finished"
        );
        Ok(result)
    }
}
