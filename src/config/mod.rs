//! Pipeline configuration.
//!
//! - **types**: the configuration schema (`PipelineConfiguration` and friends)
//! - **loader**: YAML loading for the pipeline and remote settings
//! - **overrides**: the run-time override protocol used by the remote backend
//!
//! # Example
//!
//! ```rust,ignore
//! use resume_pipeline::config::{ConfigLoader, overrides::apply_overrides};
//!
//! let config = ConfigLoader::from_env()?.load_pipeline()?;
//! let patched = apply_overrides(&config, &run_parameters)?;
//! ```

pub mod loader;
pub mod overrides;
pub mod types;

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::StepKind;

pub use loader::{ConfigLoader, RemoteConfig, ScheduleConfig, WEEKDAYS};
pub use overrides::{apply_overrides, PARAMETERS_NAMESPACE};
pub use types::{
    CommonProperties, Components, DataPlotCreationStepProperties, DataProperties,
    DataValidatingStepProperties, DatasetName, DatasetTag, ExtractionStepProperties,
    PipelineConfiguration, PreprocessingStepProperties,
};

/// Errors that can occur while loading, validating or patching configuration.
///
/// Every variant is fatal for a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A stage has no properties record.
    #[error("Missing properties for {0} step")]
    MissingStepProperties(StepKind),

    /// A dataset identifier is absent from the `dataset` block.
    #[error("Parameters not found for dataset {0}")]
    MissingDatasetParameters(crate::config::DatasetName),

    /// A dataset descriptor has no custom properties where a stage needs them.
    #[error("Dataset {0} has no custom properties")]
    MissingCustomProperties(crate::config::DatasetName),

    /// A required parameter is absent.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// A parameter has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// An override path does not resolve to an existing configuration entry.
    #[error("Override {key} does not resolve: no entry '{segment}'")]
    OverrideKeyNotFound { key: String, segment: String },

    /// An override value has a different type than the value it replaces.
    #[error("Override {key} has type {actual}, expected {expected}")]
    OverrideTypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// The run mode selected on the command line is not valid.
    #[error("Invalid run mode: {0}")]
    InvalidMode(String),

    /// Failed to read a configuration file.
    #[error("Failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
