//! Nested pipeline delegation

use super::{wrong_step, StepHandler, StepRunner};
use crate::core::{ContextManager, Step, StepType};
use crate::error::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Runs a nested pipeline in a pushed scope seeded with the nested
/// pipeline's own variables.
///
/// Parent variables stay resolvable through the scope stack but are
/// shadowed by the nested pipeline's bindings; the scope is popped whether
/// the nested run succeeds or fails, so nothing written inside leaks into
/// the parent. The child's last result is the step result.
pub struct SubPipelineHandler;

#[async_trait]
impl StepHandler for SubPipelineHandler {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ContextManager,
        runner: &dyn StepRunner,
        depth: usize,
    ) -> Result<Value, EngineError> {
        let Step::SubPipeline { pipeline, .. } = step else {
            return Err(wrong_step(StepType::SubPipeline, step));
        };

        if pipeline.steps.is_empty() {
            return Err(EngineError::EmptyPipeline);
        }

        debug!(pipeline = %pipeline.name, "entering nested pipeline");

        context.push_scope(pipeline.variables.clone());
        let run = runner.run_steps(&pipeline.steps, context, depth + 1).await;
        context.pop_scope()?;

        run
    }
}
