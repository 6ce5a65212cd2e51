//! Publisher that stores artifacts in the remote task tracker.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::PublishError;
use crate::remote::TaskTracker;

use super::{cell_text, ArtifactLogger, Chart};

/// Publishes tables and charts as tracker artifacts owned by a run scope.
pub struct TrackerLogger {
    tracker: Arc<dyn TaskTracker>,
    scope: String,
}

impl TrackerLogger {
    pub fn new(tracker: Arc<dyn TaskTracker>, scope: impl Into<String>) -> Self {
        Self {
            tracker,
            scope: scope.into(),
        }
    }

    async fn publish_table(&self, name: &str, values: &BTreeMap<String, Value>) -> Result<(), PublishError> {
        let table: BTreeMap<&str, Vec<String>> = values
            .iter()
            .map(|(k, v)| (k.as_str(), vec![cell_text(v)]))
            .collect();
        self.tracker
            .publish_artifact(&self.scope, name, serde_json::to_value(table)?)
            .await?;
        Ok(())
    }

    async fn publish_chart(&self, name: &str, chart: &Chart) -> Result<(), PublishError> {
        if chart.is_empty() {
            return Err(PublishError::EmptyChart(name.to_string()));
        }
        self.tracker
            .publish_artifact(&self.scope, name, serde_json::to_value(chart)?)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactLogger for TrackerLogger {
    async fn publish_dictionary_values(&self, name: &str, values: &BTreeMap<String, Value>) {
        match self.publish_table(name, values).await {
            Ok(()) => debug!(table = %name, scope = %self.scope, "Table published"),
            Err(e) => error!(table = %name, error = %e, "Failed to publish table"),
        }
    }

    async fn publish_plots(&self, plots: &BTreeMap<String, Chart>) {
        for (name, chart) in plots {
            match self.publish_chart(name, chart).await {
                Ok(()) => debug!(chart = %name, scope = %self.scope, "Chart published"),
                Err(e) => error!(chart = %name, error = %e, "Failed to publish chart"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::InMemoryTaskTracker;
    use serde_json::json;

    #[tokio::test]
    async fn test_publishes_tables_as_string_columns() {
        let tracker = Arc::new(InMemoryTaskTracker::new());
        let logger = TrackerLogger::new(tracker.clone(), "resumes");

        let mut values = BTreeMap::new();
        values.insert("total".to_string(), json!(12));
        logger.publish_dictionary_values("summary", &values).await;

        let artifacts = tracker.artifacts("resumes");
        assert_eq!(artifacts, vec![("summary".to_string(), json!({"total": ["12"]}))]);
    }

    #[tokio::test]
    async fn test_empty_chart_is_skipped() {
        let tracker = Arc::new(InMemoryTaskTracker::new());
        let logger = TrackerLogger::new(tracker.clone(), "resumes");

        let mut plots = BTreeMap::new();
        plots.insert("empty".to_string(), Chart::new("Empty", "x", "y"));
        plots.insert(
            "age".to_string(),
            Chart::scatter("Age vs salary", "age", "salary", &[(30.0, 1.0)]),
        );
        logger.publish_plots(&plots).await;

        let names: Vec<String> = tracker.artifacts("resumes").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["age".to_string()]);
    }
}
