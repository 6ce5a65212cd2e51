//! resume-pipeline: a resume dataset pipeline with a statistical quality gate.
//!
//! This library runs extraction, preprocessing, validation and reporting
//! over resume datasets, either in-process or as tracked remote tasks.

// Core modules
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod remote;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used error types
pub use config::ConfigError;
pub use error::{DataError, PipelineError, PublishError, TrackerError};
