//! Conditional branching

use super::{wrong_step, StepHandler, StepRunner};
use crate::core::{ContextManager, Step, StepType};
use crate::error::EngineError;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Evaluates the step's condition against the context and runs the `then`
/// or `else` branch. An empty taken branch yields null.
pub struct ConditionalHandler;

#[async_trait]
impl StepHandler for ConditionalHandler {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ContextManager,
        runner: &dyn StepRunner,
        depth: usize,
    ) -> Result<Value, EngineError> {
        let Step::Conditional { condition, then, r#else, .. } = step else {
            return Err(wrong_step(StepType::Conditional, step));
        };

        let taken = condition.evaluate(context)?;
        debug!(taken, "conditional evaluated");

        let branch = if taken { then } else { r#else };
        if branch.is_empty() {
            return Ok(Value::Null);
        }
        runner.run_steps(branch, context, depth + 1).await
    }
}
