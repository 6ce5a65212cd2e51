//! Stage abstraction.
//!
//! A [`Step`] is one of the four ordered stages. A [`StepAdapter`] turns a
//! step into a [`RunnableStep`] for a particular execution backend.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfiguration;
use crate::data::DataAccess;
use crate::publish::ArtifactLogger;

/// Identifier of a pipeline stage, in run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Extraction,
    Preprocessing,
    Validation,
    Reporting,
}

impl StepKind {
    /// All stages in the order they run.
    pub const ALL: [StepKind; 4] = [
        StepKind::Extraction,
        StepKind::Preprocessing,
        StepKind::Validation,
        StepKind::Reporting,
    ];

    /// Stage name, also used as the remote task name.
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Extraction => "extraction_step",
            StepKind::Preprocessing => "preprocessing_step",
            StepKind::Validation => "data_validating_step",
            StepKind::Reporting => "data_plot_creation_step",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs shared by every stage of a run.
#[derive(Clone)]
pub struct StepContext {
    pub config: Arc<PipelineConfiguration>,
    pub data: Arc<dyn DataAccess>,
    pub logger: Arc<dyn ArtifactLogger>,
}

/// Values that can be threaded between stages.
///
/// Remote execution serializes every stage output, so inputs and outputs
/// must round-trip through JSON.
pub trait StepValue: Serialize + DeserializeOwned + Send + 'static {}

impl<T> StepValue for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// One pipeline stage taking `I` (the previous stage's result) and
/// producing `O`.
#[async_trait]
pub trait Step<I, O>: Send + Sync
where
    I: StepValue,
    O: StepValue,
{
    fn kind(&self) -> StepKind;

    async fn run(&self, ctx: StepContext, input: I) -> anyhow::Result<O>;
}

/// A stage prepared for a backend.
pub type RunnableStep<I, O> =
    Arc<dyn Fn(StepContext, I) -> BoxFuture<'static, anyhow::Result<O>> + Send + Sync>;

/// Decorates stages for an execution backend.
///
/// The controller receives one adapter and never branches on the backend.
pub trait StepAdapter: Send + Sync {
    fn wrap<I, O>(&self, step: Arc<dyn Step<I, O>>) -> RunnableStep<I, O>
    where
        I: StepValue,
        O: StepValue;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names() {
        let names: Vec<&str> = StepKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            vec![
                "extraction_step",
                "preprocessing_step",
                "data_validating_step",
                "data_plot_creation_step"
            ]
        );
        assert_eq!(StepKind::Validation.to_string(), "data_validating_step");
    }
}
