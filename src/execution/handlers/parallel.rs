//! Concurrent branch execution

use super::{wrong_step, StepHandler, StepRunner};
use crate::core::{ContextManager, Step, StepType};
use crate::error::EngineError;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

/// Runs each child step concurrently against an isolated copy of the
/// context.
///
/// Every branch is seeded with a snapshot of the visible variables at
/// dispatch time; writes made inside a branch stay in that branch. Results
/// come back as an array in declaration order regardless of completion
/// order. The first branch failure fails the step.
pub struct ParallelHandler;

#[async_trait]
impl StepHandler for ParallelHandler {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ContextManager,
        runner: &dyn StepRunner,
        depth: usize,
    ) -> Result<Value, EngineError> {
        let Step::Parallel { steps, .. } = step else {
            return Err(wrong_step(StepType::Parallel, step));
        };

        debug!(branches = steps.len(), "dispatching parallel branches");

        let snapshot = context.get_all(true);
        let mut branches: Vec<ContextManager> = steps
            .iter()
            .map(|_| ContextManager::with_variables(snapshot.clone()))
            .collect();

        let futures = branches
            .iter_mut()
            .zip(steps.iter())
            .map(|(branch, step)| runner.run_step(step, branch, depth + 1));

        let results = try_join_all(futures).await?;
        Ok(Value::Array(results))
    }
}
