//! Extraction stage.
//!
//! Resumes are fetched from a [`ResumeSource`] for every configured
//! position. Each row is stamped with the searched position and the load
//! date. With `use_increment` set on the source dataset, only resumes
//! updated since the latest previous load are fetched and the history is
//! kept below the new rows.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::DatasetName;
use crate::data::{Dataset, Row};
use crate::pipeline::results::ExtractionResult;
use crate::pipeline::step::{Step, StepContext, StepKind};

use super::{dataset_custom_properties, today, RESUME_UPDATED_COLUMN, SEARCHED_POSITION_COLUMN};

/// Provider of raw resume rows.
#[async_trait]
pub trait ResumeSource: Send + Sync {
    /// Resumes found for `position`, limited to those updated on or after
    /// `since` when given.
    async fn fetch(&self, position: &str, since: Option<NaiveDate>) -> anyhow::Result<Vec<Row>>;
}

fn parse_date(cell: Option<&Value>) -> Option<NaiveDate> {
    let text = cell?.as_str()?;
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Reads resumes dumped as one JSON array per position:
/// `<dir>/<position>.json`, with the position lowercased and every
/// non-alphanumeric character replaced by `_`.
#[derive(Debug, Clone)]
pub struct JsonDumpSource {
    dir: PathBuf,
}

impl JsonDumpSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn position_path(&self, position: &str) -> PathBuf {
        let slug: String = position
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", slug))
    }
}

#[async_trait]
impl ResumeSource for JsonDumpSource {
    async fn fetch(&self, position: &str, since: Option<NaiveDate>) -> anyhow::Result<Vec<Row>> {
        let path = self.position_path(position);
        if !tokio::fs::try_exists(&path).await? {
            warn!(position = %position, path = ?path, "No resume dump for position");
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let rows: Vec<Row> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid resume dump {:?}: {}", path, e))?;

        Ok(rows
            .into_iter()
            .filter(|row| match (since, parse_date(row.get(RESUME_UPDATED_COLUMN))) {
                (Some(since), Some(updated)) => updated >= since,
                _ => true,
            })
            .collect())
    }
}

pub struct ExtractionStep {
    source: Arc<dyn ResumeSource>,
}

impl ExtractionStep {
    pub fn new(source: Arc<dyn ResumeSource>) -> Self {
        Self { source }
    }

    /// Previously extracted rows. Load failures are logged and treated as
    /// no history.
    async fn load_history(&self, ctx: &StepContext) -> Option<Dataset> {
        match ctx.data.get_dataset(DatasetName::SourceData).await {
            Ok(history) => Some(history),
            Err(e) => {
                error!(error = %e, "Failed to load extraction history");
                None
            }
        }
    }
}

/// Latest load date recorded in `history`.
fn last_load_date(history: &Dataset, date_column: &str) -> Option<NaiveDate> {
    history.column(date_column).filter_map(parse_date).max()
}

#[async_trait]
impl Step<(), ExtractionResult> for ExtractionStep {
    fn kind(&self) -> StepKind {
        StepKind::Extraction
    }

    async fn run(&self, ctx: StepContext, _input: ()) -> anyhow::Result<ExtractionResult> {
        let properties = ctx.config.components.extraction()?;
        let dataset_parameters =
            dataset_custom_properties(ctx.data.as_ref(), DatasetName::SourceData)?;
        let use_increment = dataset_parameters
            .get("use_increment")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let date_column = ctx.data.dataset_extracting_date_column_name().to_string();
        let history = if use_increment {
            self.load_history(&ctx).await
        } else {
            None
        };
        let since = history
            .as_ref()
            .and_then(|history| last_load_date(history, &date_column));
        let load_date = today().to_string();

        let mut extracted = Dataset::default();
        for position in &properties.positions_to_extract {
            let rows = self.source.fetch(position, since).await?;
            debug!(position = %position, rows = rows.len(), "Resumes fetched");

            for mut row in rows {
                row.insert(SEARCHED_POSITION_COLUMN.to_string(), Value::from(position.as_str()));
                row.insert(date_column.clone(), Value::from(load_date.as_str()));
                extracted.push_row(row);
            }
        }

        let fetched = extracted.len();
        if let Some(history) = history {
            extracted = extracted.concat(history);
        }
        ctx.data
            .save_dataset(&extracted, DatasetName::SourceData)
            .await?;

        let summary = BTreeMap::from([
            (
                "positions_to_extract".to_string(),
                Value::from(properties.positions_to_extract.clone()),
            ),
            ("use_increment".to_string(), Value::from(use_increment)),
            (
                "extracted_from".to_string(),
                since.map_or(Value::Null, |d| Value::from(d.to_string())),
            ),
            ("new_rows".to_string(), Value::from(fetched)),
            ("total_rows".to_string(), Value::from(extracted.len())),
        ]);
        ctx.logger
            .publish_dictionary_values("extraction_step_parameters", &summary)
            .await;

        info!(
            dataset = %DatasetName::SourceData,
            new_rows = fetched,
            total_rows = extracted.len(),
            "Extraction finished"
        );
        Ok(ExtractionResult::new(DatasetName::SourceData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetTag;
    use crate::data::{InMemoryFileManager, DATASET_EXTRACTING_DATE_COLUMN};
    use crate::test_support::{context, row, sample_config};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FixedSource {
        calls: Mutex<Vec<(String, Option<NaiveDate>)>>,
    }

    #[async_trait]
    impl ResumeSource for FixedSource {
        async fn fetch(&self, position: &str, since: Option<NaiveDate>) -> anyhow::Result<Vec<Row>> {
            self.calls.lock().unwrap().push((position.to_string(), since));
            Ok(vec![row(json!({"desired_position": format!("{} engineer", position), "salary": "100 000 руб."}))])
        }
    }

    #[test]
    fn test_position_path() {
        let source = JsonDumpSource::new("/dumps");
        assert_eq!(
            source.position_path("DevOps Engineer"),
            PathBuf::from("/dumps/devops_engineer.json")
        );
    }

    #[tokio::test]
    async fn test_json_dump_source_filters_by_date() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("devops.json"),
            r#"[
                {"desired_position": "DevOps", "resume_updated_at": "2024-03-01"},
                {"desired_position": "SRE", "resume_updated_at": "2024-01-15"},
                {"desired_position": "Admin"}
            ]"#,
        )
        .unwrap();

        let source = JsonDumpSource::new(dir.path());
        assert_eq!(source.fetch("devops", None).await.unwrap().len(), 3);

        let since = NaiveDate::from_ymd_opt(2024, 2, 1);
        let rows = source.fetch("devops", since).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(source.fetch("qa", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extraction_stamps_rows() {
        let files = Arc::new(InMemoryFileManager::new());
        let ctx = context(sample_config(), files.clone());
        let source = Arc::new(FixedSource::default());

        let result = ExtractionStep::new(source.clone())
            .run(ctx.clone(), ())
            .await
            .unwrap();
        assert_eq!(result.source_data(), Some(DatasetName::SourceData));

        let saved = ctx.data.get_dataset(DatasetName::SourceData).await.unwrap();
        assert_eq!(saved.len(), 1);
        let first = &saved.rows()[0];
        assert_eq!(first[SEARCHED_POSITION_COLUMN], json!("devops"));
        assert_eq!(first[DATASET_EXTRACTING_DATE_COLUMN], json!(today().to_string()));
        assert_eq!(source.calls.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn test_extraction_increment_appends_history() {
        let mut config = sample_config();
        let source_props = config.dataset[&DatasetName::SourceData]
            .clone()
            .with_custom_property("use_increment", json!(true));
        config = config.with_dataset(DatasetName::SourceData, source_props.clone());

        let history = Dataset::from_rows(vec![
            row(json!({"desired_position": "old", "pipeline_load_date": "2024-01-10"})),
            row(json!({"desired_position": "older", "pipeline_load_date": "2024-01-05"})),
        ]);
        let files = Arc::new(InMemoryFileManager::new().with_dataset(&source_props, history));
        let ctx = context(config, files);
        let source = Arc::new(FixedSource::default());

        ExtractionStep::new(source.clone()).run(ctx.clone(), ()).await.unwrap();

        let saved = ctx.data.get_dataset(DatasetName::SourceData).await.unwrap();
        assert_eq!(saved.len(), 3);
        assert_eq!(saved.rows()[0][SEARCHED_POSITION_COLUMN], json!("devops"));
        assert_eq!(
            source.calls.lock().unwrap()[0].1,
            NaiveDate::from_ymd_opt(2024, 1, 10)
        );
    }

    #[tokio::test]
    async fn test_extraction_increment_without_history() {
        let mut config = sample_config();
        let source_props = config.dataset[&DatasetName::SourceData]
            .clone()
            .with_custom_property("use_increment", json!(true));
        config = config.with_dataset(DatasetName::SourceData, source_props);
        let ctx = context(config, Arc::new(InMemoryFileManager::new()));

        ExtractionStep::new(Arc::new(FixedSource::default()))
            .run(ctx.clone(), ())
            .await
            .unwrap();
        let saved = ctx.data.get_dataset(DatasetName::SourceData).await.unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn test_extraction_requires_custom_properties() {
        let config = sample_config().with_dataset(
            DatasetName::SourceData,
            crate::config::DataProperties::new("source", "raw resumes", DatasetTag::Raw),
        );
        let ctx = context(config, Arc::new(InMemoryFileManager::new()));

        let err = ExtractionStep::new(Arc::new(FixedSource::default()))
            .run(ctx, ())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("custom properties"));
    }
}
