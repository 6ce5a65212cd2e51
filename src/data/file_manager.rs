//! Dataset persistence backends.
//!
//! A [`FileManager`] stores and loads whole datasets addressed by their
//! [`DataProperties`] (storage name and tag). The local backend writes JSON
//! files under `<datasets_dir>/<tag>/<name>.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::config::DataProperties;
use crate::error::DataError;

use super::dataset::Dataset;

/// Storage backend for datasets.
#[async_trait]
pub trait FileManager: Send + Sync {
    /// Loads a dataset. A dataset that was never saved is `DataError::NotFound`.
    async fn load_dataset(&self, properties: &DataProperties) -> Result<Dataset, DataError>;

    /// Saves a dataset, replacing any previous version.
    async fn save_dataset(
        &self,
        dataset: &Dataset,
        properties: &DataProperties,
    ) -> Result<(), DataError>;

    /// Whether saved datasets are also copied into the project directory.
    fn provide_artifacts_to_project_dir(&self) -> bool;

    fn set_provide_artifacts_to_project_dir(&self, value: bool);
}

/// Relative location of a dataset inside a storage root.
pub fn dataset_relative_path(properties: &DataProperties) -> PathBuf {
    PathBuf::from(properties.tag.to_string()).join(format!("{}.json", properties.name))
}

/// Filesystem-backed file manager.
#[derive(Debug)]
pub struct LocalFileManager {
    datasets_dir: PathBuf,
    project_dir: Option<PathBuf>,
    provide_artifacts: AtomicBool,
}

impl LocalFileManager {
    pub fn new(datasets_dir: impl Into<PathBuf>) -> Self {
        Self {
            datasets_dir: datasets_dir.into(),
            project_dir: None,
            provide_artifacts: AtomicBool::new(false),
        }
    }

    /// Builder method to set the directory that receives artifact copies.
    pub fn with_project_dir(mut self, project_dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(project_dir.into());
        self
    }

    pub fn datasets_dir(&self) -> &Path {
        &self.datasets_dir
    }

    /// Absolute path of a dataset file.
    pub fn dataset_path(&self, properties: &DataProperties) -> PathBuf {
        self.datasets_dir.join(dataset_relative_path(properties))
    }

    async fn write_json(path: &Path, content: &[u8]) -> Result<(), DataError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl FileManager for LocalFileManager {
    async fn load_dataset(&self, properties: &DataProperties) -> Result<Dataset, DataError> {
        let path = self.dataset_path(properties);
        debug!(dataset = %properties.name, path = ?path, "Loading dataset");

        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::NotFound(properties.name.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&content)?)
    }

    async fn save_dataset(
        &self,
        dataset: &Dataset,
        properties: &DataProperties,
    ) -> Result<(), DataError> {
        let path = self.dataset_path(properties);
        let content = serde_json::to_vec_pretty(dataset)?;

        Self::write_json(&path, &content).await?;
        debug!(dataset = %properties.name, rows = dataset.len(), path = ?path, "Dataset saved");

        if self.provide_artifacts_to_project_dir() {
            if let Some(project_dir) = &self.project_dir {
                let mirror = project_dir.join(dataset_relative_path(properties));
                Self::write_json(&mirror, &content).await?;
                debug!(dataset = %properties.name, path = ?mirror, "Dataset copied to project directory");
            }
        }

        Ok(())
    }

    fn provide_artifacts_to_project_dir(&self) -> bool {
        self.provide_artifacts.load(Ordering::Relaxed)
    }

    fn set_provide_artifacts_to_project_dir(&self, value: bool) {
        self.provide_artifacts.store(value, Ordering::Relaxed);
    }
}

/// Process-local file manager, keyed by `<tag>/<name>`.
#[derive(Debug, Default)]
pub struct InMemoryFileManager {
    datasets: Mutex<HashMap<String, Dataset>>,
    saves: Mutex<Vec<String>>,
    provide_artifacts: AtomicBool,
}

impl InMemoryFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(properties: &DataProperties) -> String {
        format!("{}/{}", properties.tag, properties.name)
    }

    /// Builder method to seed a dataset.
    pub fn with_dataset(self, properties: &DataProperties, dataset: Dataset) -> Self {
        self.insert(properties, dataset);
        self
    }

    /// Stores a dataset without recording a save.
    pub fn insert(&self, properties: &DataProperties, dataset: Dataset) {
        self.datasets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(Self::key(properties), dataset);
    }

    /// Returns the stored dataset, if any.
    pub fn get(&self, properties: &DataProperties) -> Option<Dataset> {
        self.datasets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&Self::key(properties))
            .cloned()
    }

    /// Keys of every save, in order.
    pub fn saves(&self) -> Vec<String> {
        self.saves.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl FileManager for InMemoryFileManager {
    async fn load_dataset(&self, properties: &DataProperties) -> Result<Dataset, DataError> {
        self.get(properties)
            .ok_or_else(|| DataError::NotFound(properties.name.clone()))
    }

    async fn save_dataset(
        &self,
        dataset: &Dataset,
        properties: &DataProperties,
    ) -> Result<(), DataError> {
        self.insert(properties, dataset.clone());
        self.saves
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Self::key(properties));
        Ok(())
    }

    fn provide_artifacts_to_project_dir(&self) -> bool {
        self.provide_artifacts.load(Ordering::Relaxed)
    }

    fn set_provide_artifacts_to_project_dir(&self, value: bool) {
        self.provide_artifacts.store(value, Ordering::Relaxed);
    }
}
