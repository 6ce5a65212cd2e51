//! Distributed-task execution backend.
//!
//! Each stage is registered with a [`TaskTracker`] as a named task in its
//! category, executed on a spawned worker task, and its output is stored as
//! the task's return value. The next stage receives the output decoded back
//! from that stored value.
//!
//! [`RemotePipelineController`] additionally applies the run parameters of
//! the current run to the default configuration before any stage starts.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{apply_overrides, PipelineConfiguration};
use crate::error::PipelineError;
use crate::remote::{RunParameterSource, TaskDescriptor, TaskTracker};

use super::controller::{AssembledPipeline, PipelineController, RunReport, RunnablePipeline};
use super::step::{RunnableStep, Step, StepAdapter, StepContext, StepValue};

/// Wraps stages as tracked distributed tasks.
#[derive(Clone)]
pub struct RemoteStepAdapter {
    tracker: Arc<dyn TaskTracker>,
    project: String,
    queue: String,
}

impl RemoteStepAdapter {
    pub fn new(
        tracker: Arc<dyn TaskTracker>,
        project: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            tracker,
            project: project.into(),
            queue: queue.into(),
        }
    }

    pub fn tracker(&self) -> Arc<dyn TaskTracker> {
        self.tracker.clone()
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

/// Marks a task failed without masking the stage error.
async fn record_failure(tracker: &dyn TaskTracker, task_id: Uuid, reason: &str) {
    if let Err(e) = tracker.fail(task_id, reason).await {
        warn!(task_id = %task_id, error = %e, "Could not record task failure");
    }
}

impl StepAdapter for RemoteStepAdapter {
    fn wrap<I, O>(&self, step: Arc<dyn Step<I, O>>) -> RunnableStep<I, O>
    where
        I: StepValue,
        O: StepValue,
    {
        let tracker = self.tracker.clone();
        let project = self.project.clone();
        let queue = self.queue.clone();

        Arc::new(move |ctx: StepContext, input: I| -> BoxFuture<'static, anyhow::Result<O>> {
            let step = step.clone();
            let tracker = tracker.clone();
            let descriptor = TaskDescriptor::for_step(step.kind(), project.clone(), queue.clone());

            Box::pin(async move {
                let task_id = tracker.register(&descriptor).await?;
                tracker.mark_running(task_id).await?;
                debug!(
                    task = %descriptor.name,
                    task_id = %task_id,
                    category = %descriptor.category,
                    queue = %descriptor.queue,
                    "Task dispatched"
                );

                let worker = tokio::spawn(async move { step.run(ctx, input).await });
                let output = match worker.await {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        record_failure(tracker.as_ref(), task_id, &e.to_string()).await;
                        return Err(e);
                    }
                    Err(join_error) => {
                        let reason = format!("worker for {} stopped: {}", descriptor.name, join_error);
                        record_failure(tracker.as_ref(), task_id, &reason).await;
                        return Err(anyhow::anyhow!(reason));
                    }
                };

                let return_value = serde_json::to_value(&output)?;
                tracker.complete(task_id, return_value.clone()).await?;
                debug!(task = %descriptor.name, return_value = %descriptor.return_value, "Task completed");

                Ok(serde_json::from_value(return_value)?)
            })
        })
    }
}

/// Controller whose runs start by applying external run parameters.
pub struct RemotePipelineController {
    controller: PipelineController<RemoteStepAdapter>,
    parameters: Arc<dyn RunParameterSource>,
}

impl RemotePipelineController {
    pub fn new(
        controller: PipelineController<RemoteStepAdapter>,
        parameters: Arc<dyn RunParameterSource>,
    ) -> Self {
        Self {
            controller,
            parameters,
        }
    }

    pub fn config(&self) -> &PipelineConfiguration {
        self.controller.config()
    }

    pub fn assemble(&self) -> RemotePipeline {
        RemotePipeline {
            pipeline: self.controller.assemble(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Assembled remote procedure.
pub struct RemotePipeline {
    pipeline: AssembledPipeline,
    parameters: Arc<dyn RunParameterSource>,
}

impl RemotePipeline {
    /// Fetches the run parameters and applies them to the default
    /// configuration. The default stays untouched.
    pub async fn resolve_config(&self) -> Result<PipelineConfiguration, PipelineError> {
        let parameters = self
            .parameters
            .fetch()
            .await
            .map_err(PipelineError::RunParameters)?;
        info!(count = parameters.len(), "Run parameters received");
        Ok(apply_overrides(self.pipeline.config(), &parameters)?)
    }
}

#[async_trait]
impl RunnablePipeline for RemotePipeline {
    async fn run(&self) -> Result<RunReport, PipelineError> {
        let config = self.resolve_config().await?;
        self.pipeline.run_with_config(config).await
    }
}
