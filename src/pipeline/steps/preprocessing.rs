//! Preprocessing stage.
//!
//! Only the rows extracted today are processed; the result is appended to
//! the previously preprocessed dataset.
//!
//! # Transformations
//!
//! 1. `salary`: digits of the text kept and parsed as an integer
//! 2. `age`: the two-digit number before `г` (as in "34 года") parsed as an integer
//! 3. missing ages filled with random integers drawn uniformly from
//!    `[max(mean - 3σ, 0), mean + 3σ]` of the known ages
//! 4. rows whose desired position scores below `unmatching_jobs_threshold`
//!    against the searched position are dropped
//! 5. the desired position column is dropped

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use async_trait::async_trait;
use rand::RngExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::DatasetName;
use crate::data::{is_missing, Dataset};
use crate::pipeline::results::{ExtractionResult, PreprocessingResult};
use crate::pipeline::step::{Step, StepContext, StepKind};
use crate::validation::statistics::{mean, sample_std};

use super::classifier::{ClassifierProvider, PositionClassifier};
use super::{
    dataset_custom_properties, today, AGE_COLUMN, DESIRED_POSITION_COLUMN, SALARY_COLUMN,
    SEARCHED_POSITION_COLUMN,
};

/// Two digits followed by "г", as in "34 года" or "41 год".
fn age_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{2}) г").expect("Invalid regex for age"))
}

/// Salary as an integer built from the digits of the cell.
pub fn extract_salary(cell: Option<&Value>) -> Value {
    match cell {
        Some(Value::Number(n)) => n.as_i64().map_or(Value::Null, Value::from),
        Some(Value::String(text)) => {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<i64>().map_or(Value::Null, Value::from)
        }
        _ => Value::Null,
    }
}

/// Age in years from text such as "34 года".
pub fn extract_age(cell: Option<&Value>) -> Value {
    match cell {
        Some(Value::Number(n)) => n.as_i64().map_or(Value::Null, Value::from),
        Some(Value::String(text)) => age_pattern()
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .map_or(Value::Null, Value::from),
        _ => Value::Null,
    }
}

/// Replaces missing values of `column` with integers drawn uniformly from
/// three standard deviations around the mean, clamped at zero.
///
/// Leaves the column unchanged when fewer than two values are known.
pub fn fill_missing_uniform(dataset: &mut Dataset, column: &str, rng: &mut ChaCha8Rng) {
    let known = dataset.numeric_column(column);
    let (Some(m), Some(std)) = (mean(&known), sample_std(&known)) else {
        return;
    };

    let lower = (m - 3.0 * std).max(0.0);
    let upper = m + 3.0 * std;

    dataset.map_column(column, |row| match row.get(column) {
        cell if is_missing(cell) => {
            let drawn = if upper > lower {
                rng.random_range(lower..upper)
            } else {
                lower
            };
            Value::from(drawn as i64)
        }
        cell => cell.cloned().unwrap_or(Value::Null),
    });
}

fn text_of<'a>(row: &'a crate::data::Row, column: &str) -> &'a str {
    row.get(column).and_then(Value::as_str).unwrap_or_default()
}

/// Applies the row transformations to one increment.
pub fn preprocess(
    mut dataset: Dataset,
    unmatching_jobs_threshold: f64,
    classifier: &dyn PositionClassifier,
    rng: &mut ChaCha8Rng,
) -> Dataset {
    if dataset.is_empty() {
        return Dataset::default();
    }

    dataset.map_column(SALARY_COLUMN, |row| extract_salary(row.get(SALARY_COLUMN)));
    dataset.map_column(AGE_COLUMN, |row| extract_age(row.get(AGE_COLUMN)));
    fill_missing_uniform(&mut dataset, AGE_COLUMN, rng);

    dataset.retain(|row| {
        let score = classifier.score(
            text_of(row, DESIRED_POSITION_COLUMN),
            text_of(row, SEARCHED_POSITION_COLUMN),
        );
        score >= unmatching_jobs_threshold
    });
    dataset.drop_column(DESIRED_POSITION_COLUMN);

    dataset
}

pub struct PreprocessingStep {
    classifier: Arc<dyn ClassifierProvider>,
    seed: Option<u64>,
}

impl PreprocessingStep {
    pub fn new(classifier: Arc<dyn ClassifierProvider>) -> Self {
        Self {
            classifier,
            seed: None,
        }
    }

    /// Builder method to make the age filling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn create_rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }
}

#[async_trait]
impl Step<ExtractionResult, PreprocessingResult> for PreprocessingStep {
    fn kind(&self) -> StepKind {
        StepKind::Preprocessing
    }

    async fn run(
        &self,
        ctx: StepContext,
        input: ExtractionResult,
    ) -> anyhow::Result<PreprocessingResult> {
        let properties = ctx.config.components.preprocessing()?;
        let source_name = input
            .source_data()
            .context("extraction result has no source_data entry")?;
        dataset_custom_properties(ctx.data.as_ref(), source_name)?;
        dataset_custom_properties(ctx.data.as_ref(), DatasetName::PreprocessedData)?;

        let mut increment = ctx.data.get_dataset(source_name).await?;
        let date_column = ctx.data.dataset_extracting_date_column_name().to_string();
        let load_date = Value::from(today().to_string());
        increment.retain(|row| row.get(&date_column) == Some(&load_date));
        debug!(rows = increment.len(), "Preprocessing today's increment");

        let classifier = self.classifier.load().await?;
        let mut rng = self.create_rng();
        let processed = preprocess(
            increment,
            properties.unmatching_jobs_threshold,
            classifier.as_ref(),
            &mut rng,
        );
        let processed_rows = processed.len();

        let previous = match ctx.data.get_dataset(DatasetName::PreprocessedData).await {
            Ok(previous) => previous,
            Err(e) if e.is_not_found() => Dataset::default(),
            Err(e) => return Err(e.into()),
        };
        let combined = previous.concat(processed);
        ctx.data
            .save_dataset(&combined, DatasetName::PreprocessedData)
            .await?;

        let summary = BTreeMap::from([
            (
                "unmatching_jobs_threshold".to_string(),
                Value::from(properties.unmatching_jobs_threshold),
            ),
            ("processed_rows".to_string(), Value::from(processed_rows)),
            ("total_rows".to_string(), Value::from(combined.len())),
        ]);
        ctx.logger
            .publish_dictionary_values("preprocessing_step_parameters", &summary)
            .await;

        info!(
            dataset = %DatasetName::PreprocessedData,
            processed_rows,
            total_rows = combined.len(),
            "Preprocessing finished"
        );
        Ok(PreprocessingResult::new(DatasetName::PreprocessedData))
    }
}
