//! In-process execution backend.

use std::sync::Arc;

use futures::future::BoxFuture;

use super::step::{RunnableStep, Step, StepAdapter, StepContext, StepValue};

/// Runs every stage as a direct call in the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStepAdapter;

impl LocalStepAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl StepAdapter for LocalStepAdapter {
    fn wrap<I, O>(&self, step: Arc<dyn Step<I, O>>) -> RunnableStep<I, O>
    where
        I: StepValue,
        O: StepValue,
    {
        Arc::new(move |ctx: StepContext, input: I| -> BoxFuture<'static, anyhow::Result<O>> {
            let step = step.clone();
            Box::pin(async move { step.run(ctx, input).await })
        })
    }
}
