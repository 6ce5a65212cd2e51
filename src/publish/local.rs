//! Console publisher for local runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::error::PublishError;

use super::{cell_text, ArtifactLogger, Chart};

/// Writes tables and chart summaries to the log and, when a reports
/// directory is set, saves every chart as `<reports_dir>/<name>.json`.
#[derive(Debug, Clone, Default)]
pub struct LocalLogger {
    reports_dir: Option<PathBuf>,
}

impl LocalLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the directory charts are saved to.
    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = Some(dir.into());
        self
    }

    /// Markdown table with one header row and one value row.
    pub fn markdown_table(values: &BTreeMap<String, Value>) -> String {
        let keys: Vec<&str> = values.keys().map(String::as_str).collect();
        let cells: Vec<String> = values.values().map(cell_text).collect();

        format!(
            "| {} |\n| {} |\n| {} |\n",
            keys.join(" | "),
            vec!["---"; values.len()].join(" | "),
            cells.join(" | ")
        )
    }

    async fn save_chart(&self, name: &str, chart: &Chart) -> Result<Option<PathBuf>, PublishError> {
        let Some(dir) = &self.reports_dir else {
            return Ok(None);
        };
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}.json", name));
        tokio::fs::write(&path, serde_json::to_vec_pretty(chart)?).await?;
        Ok(Some(path))
    }
}

#[async_trait]
impl ArtifactLogger for LocalLogger {
    async fn publish_dictionary_values(&self, name: &str, values: &BTreeMap<String, Value>) {
        info!("Table: {}\n{}", name, Self::markdown_table(values));
    }

    async fn publish_plots(&self, plots: &BTreeMap<String, Chart>) {
        for (name, chart) in plots {
            info!(
                chart = %name,
                title = %chart.title,
                x = %chart.x_label,
                y = %chart.y_label,
                traces = chart.series.len(),
                points = chart.point_count(),
                "Chart created"
            );

            match self.save_chart(name, chart).await {
                Ok(Some(path)) => info!(chart = %name, path = ?path, "Chart saved"),
                Ok(None) => {}
                Err(e) => error!(chart = %name, error = %e, "Failed to save chart"),
            }
        }
    }
}
