//! Pipeline orchestration.
//!
//! A run is four ordered stages, each consuming the typed result of the one
//! before it:
//!
//! ```text
//! Extraction -> Preprocessing -> Validation -> Reporting
//! ```
//!
//! # Architecture
//!
//! - **step**: the [`Step`] trait, [`StepKind`] and the [`StepAdapter`] strategy
//! - **results**: typed stage outputs threaded between stages
//! - **controller**: [`PipelineController`] assembling stages into a runnable procedure
//! - **local**: adapter running stages as direct in-process calls
//! - **remote**: adapter running stages as tracked distributed tasks, and the
//!   controller that applies run parameters before each run
//! - **steps**: the stage components
//!
//! # Failure semantics
//!
//! A failing validation result is the only condition the controller turns
//! into an error on its own ([`PipelineError::ValidationFailed`]); reporting
//! never runs after it. Any other stage error aborts the run as
//! [`PipelineError::StageFailed`] with the stage's error as its source.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use resume_pipeline::pipeline::{LocalStepAdapter, PipelineController, PipelineSteps, RunnablePipeline};
//!
//! let steps = PipelineSteps::standard(source, Arc::new(TokenOverlapProvider));
//! let controller = PipelineController::new(config, LocalStepAdapter, steps, file_manager, logger);
//! let report = controller.assemble().run().await?;
//! ```
//!
//! [`PipelineError::ValidationFailed`]: crate::error::PipelineError::ValidationFailed
//! [`PipelineError::StageFailed`]: crate::error::PipelineError::StageFailed

pub mod controller;
pub mod local;
pub mod remote;
pub mod results;
pub mod step;
pub mod steps;

pub use controller::{AssembledPipeline, PipelineController, PipelineSteps, RunReport, RunnablePipeline};
pub use local::LocalStepAdapter;
pub use remote::{RemotePipeline, RemotePipelineController, RemoteStepAdapter};
pub use results::{ExtractionResult, PreprocessingResult, ReportingResult};
pub use step::{RunnableStep, Step, StepAdapter, StepContext, StepKind, StepValue};
