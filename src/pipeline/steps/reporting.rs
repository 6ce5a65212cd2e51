//! Reporting stage: charts and a summary table of the preprocessed dataset.
//!
//! The published set is fixed: one age histogram, one salary/age scatter
//! plot and the summary table. Per-column breakdowns are not produced.

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::data::{as_number, Dataset};
use crate::pipeline::results::{PreprocessingResult, ReportingResult};
use crate::pipeline::step::{Step, StepContext, StepKind};
use crate::publish::Chart;
use crate::validation::statistics::mean;

use super::{dataset_custom_properties, AGE_COLUMN, SALARY_COLUMN};

pub const AGE_HISTOGRAM: &str = "age_histogram";
pub const SCATTER_PLOT: &str = "scatter_plot";
pub const DATASET_SUMMARY: &str = "Dataset Summary";

/// Charts published for `dataset`.
pub fn build_charts(dataset: &Dataset, histogram_bins: u32) -> BTreeMap<String, Chart> {
    let ages = dataset.numeric_column(AGE_COLUMN);
    let points: Vec<(f64, f64)> = dataset
        .rows()
        .iter()
        .filter_map(|row| Some((as_number(row.get(AGE_COLUMN))?, as_number(row.get(SALARY_COLUMN))?)))
        .collect();

    BTreeMap::from([
        (
            AGE_HISTOGRAM.to_string(),
            Chart::histogram("Age distribution", AGE_COLUMN, &ages, histogram_bins),
        ),
        (
            SCATTER_PLOT.to_string(),
            Chart::scatter("Age vs salary", AGE_COLUMN, SALARY_COLUMN, &points),
        ),
    ])
}

/// Mean age, mean salary and row count. Means are `null` for an empty column.
pub fn summarize(dataset: &Dataset) -> BTreeMap<String, Value> {
    let mean_of = |column: &str| {
        mean(&dataset.numeric_column(column)).map_or(Value::Null, Value::from)
    };

    BTreeMap::from([
        ("Mean Age".to_string(), mean_of(AGE_COLUMN)),
        ("Mean Salary".to_string(), mean_of(SALARY_COLUMN)),
        ("Total Entries".to_string(), Value::from(dataset.len())),
    ])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportingStep;

impl ReportingStep {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Step<PreprocessingResult, ReportingResult> for ReportingStep {
    fn kind(&self) -> StepKind {
        StepKind::Reporting
    }

    async fn run(
        &self,
        ctx: StepContext,
        input: PreprocessingResult,
    ) -> anyhow::Result<ReportingResult> {
        let properties = ctx.config.components.plot_creation()?;
        let dataset_name = input
            .preprocessed_data()
            .context("preprocessing result has no preprocessed_data entry")?;
        dataset_custom_properties(ctx.data.as_ref(), dataset_name)?;

        let dataset = ctx.data.get_dataset(dataset_name).await?;

        ctx.logger
            .publish_plots(&build_charts(&dataset, properties.histogram_bins))
            .await;
        ctx.logger
            .publish_dictionary_values(DATASET_SUMMARY, &summarize(&dataset))
            .await;

        info!(dataset = %dataset_name, rows = dataset.len(), "Reports published");
        Ok(ReportingResult::new(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetName;
    use crate::data::InMemoryFileManager;
    use crate::test_support::{context_with_logger, row, sample_config, RecordingLogger};
    use serde_json::json;
    use std::sync::Arc;

    fn dataset() -> Dataset {
        Dataset::from_rows(vec![
            row(json!({"age": 30, "salary": 100000})),
            row(json!({"age": 40, "salary": 200000})),
            row(json!({"age": 35, "salary": null})),
        ])
    }

    #[test]
    fn test_summarize() {
        let summary = summarize(&dataset());
        assert_eq!(summary["Mean Age"], json!(35.0));
        assert_eq!(summary["Mean Salary"], json!(150000.0));
        assert_eq!(summary["Total Entries"], json!(3));

        let empty = summarize(&Dataset::default());
        assert_eq!(empty["Mean Age"], Value::Null);
    }

    #[test]
    fn test_build_charts() {
        let charts = build_charts(&dataset(), 5);
        assert_eq!(charts[AGE_HISTOGRAM].point_count(), 5);
        assert_eq!(charts[SCATTER_PLOT].point_count(), 2);
    }

    #[tokio::test]
    async fn test_reporting_publishes() {
        let config = sample_config();
        let files = InMemoryFileManager::new()
            .with_dataset(&config.dataset[&DatasetName::PreprocessedData], dataset());
        let logger = Arc::new(RecordingLogger::default());
        let ctx = context_with_logger(config, Arc::new(files), logger.clone());

        let result = ReportingStep::new()
            .run(ctx, PreprocessingResult::new(DatasetName::PreprocessedData))
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(logger.plot_names(), vec![AGE_HISTOGRAM, SCATTER_PLOT]);
        assert_eq!(logger.table_names(), vec![DATASET_SUMMARY]);
    }
}
