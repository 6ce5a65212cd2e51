//! Data-access facade used by every stage.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{DataProperties, DatasetName, PipelineConfiguration};
use crate::error::DataError;
use crate::metrics::MetricsCollector;

use super::dataset::Dataset;
use super::file_manager::FileManager;

/// Column stamped with the date a row was extracted.
pub const DATASET_EXTRACTING_DATE_COLUMN: &str = "pipeline_load_date";

/// Access to the run's datasets by identifier.
#[async_trait]
pub trait DataAccess: Send + Sync {
    /// Name of the column used to record the extraction date for incremental loads.
    fn dataset_extracting_date_column_name(&self) -> &str;

    async fn get_dataset(&self, name: DatasetName) -> Result<Dataset, DataError>;

    async fn save_dataset(&self, dataset: &Dataset, name: DatasetName) -> Result<(), DataError>;

    /// Returns the configured descriptor of a dataset.
    ///
    /// Fails with `ConfigError::MissingDatasetParameters` when `name` is not
    /// declared in the configuration.
    fn get_dataset_parameters(&self, name: DatasetName) -> Result<DataProperties, DataError>;
}

/// [`DataAccess`] over a [`FileManager`] and the run's configuration.
pub struct DataController {
    config: Arc<PipelineConfiguration>,
    file_manager: Arc<dyn FileManager>,
    metrics: MetricsCollector,
}

impl DataController {
    /// Creates the facade and applies the configuration's artifact flag to
    /// the file manager.
    pub fn new(config: Arc<PipelineConfiguration>, file_manager: Arc<dyn FileManager>) -> Self {
        file_manager.set_provide_artifacts_to_project_dir(
            config.common_properties.provide_artifacts_to_project_dir,
        );

        Self {
            config,
            file_manager,
            metrics: MetricsCollector::new(),
        }
    }
}

#[async_trait]
impl DataAccess for DataController {
    fn dataset_extracting_date_column_name(&self) -> &str {
        DATASET_EXTRACTING_DATE_COLUMN
    }

    async fn get_dataset(&self, name: DatasetName) -> Result<Dataset, DataError> {
        let properties = self.get_dataset_parameters(name)?;
        let dataset = self.file_manager.load_dataset(&properties).await?;
        debug!(dataset = %name, rows = dataset.len(), "Dataset loaded");
        Ok(dataset)
    }

    async fn save_dataset(&self, dataset: &Dataset, name: DatasetName) -> Result<(), DataError> {
        let properties = self.get_dataset_parameters(name)?;
        self.file_manager.save_dataset(dataset, &properties).await?;
        self.metrics.record_dataset_rows(name.as_str(), dataset.len());
        Ok(())
    }

    fn get_dataset_parameters(&self, name: DatasetName) -> Result<DataProperties, DataError> {
        Ok(self.config.dataset_properties(name)?.clone())
    }
}
