//! Error types for pipeline operations.
//!
//! Defines the error types shared across subsystems:
//! - Dataset storage and the data-access facade
//! - Artifact publication
//! - Remote task tracking
//! - Pipeline run outcome
//!
//! Configuration errors live next to the schema in [`crate::config::ConfigError`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::StepKind;
use crate::validation::DatasetValidationError;

/// Errors that can occur while loading or saving datasets.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Dataset '{0}' not found")]
    NotFound(String),

    #[error("Column '{column}' not found in dataset '{dataset}'")]
    MissingColumn { dataset: String, column: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DataError {
    /// Whether the error means the dataset simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound(_))
    }
}

/// Errors that can occur while publishing artifacts.
///
/// Loggers catch these and report them; they never reach the pipeline.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Chart '{0}' has no data")]
    EmptyChart(String),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while tracking remote tasks.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Task '{0}' not found")]
    TaskNotFound(String),

    #[error("Invalid state transition for task '{task}' from '{from}' to '{to}'")]
    InvalidTransition {
        task: String,
        from: String,
        to: String,
    },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The quality gate rejected the candidate dataset.
    #[error("Data validation failed: {error} {message}")]
    ValidationFailed {
        error: DatasetValidationError,
        message: String,
    },

    /// A stage returned an error. The stage's own error is kept as the source.
    #[error("Stage {stage} failed: {source}")]
    StageFailed {
        stage: StepKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The run parameters of a remote run could not be read.
    #[error("Failed to fetch run parameters: {0}")]
    RunParameters(#[source] anyhow::Error),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

impl PipelineError {
    /// The stage the run stopped at, if the error is tied to one.
    pub fn stage(&self) -> Option<StepKind> {
        match self {
            PipelineError::ValidationFailed { .. } => Some(StepKind::Validation),
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
