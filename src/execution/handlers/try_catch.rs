//! Error recovery

use super::{wrong_step, StepHandler, StepRunner};
use crate::core::{ContextManager, Step, StepType};
use crate::error::EngineError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Runs the `try` steps, recovering through `catch` on failure.
///
/// The catch branch sees an `error` binding describing the failure in a
/// scope popped when the branch finishes. `finally` always runs, after
/// either path; its result is discarded but its failure propagates. With
/// no catch branch the original error propagates untouched.
pub struct TryCatchHandler;

#[async_trait]
impl StepHandler for TryCatchHandler {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ContextManager,
        runner: &dyn StepRunner,
        depth: usize,
    ) -> Result<Value, EngineError> {
        let Step::TryCatch { r#try, catch, finally, .. } = step else {
            return Err(wrong_step(StepType::TryCatch, step));
        };

        let tried = runner.run_steps(r#try, context, depth + 1).await;

        let outcome = match tried {
            Ok(value) => Ok(value),
            Err(err) if catch.is_empty() => Err(err),
            Err(err) => {
                debug!(error = %err, "recovering through catch branch");

                let mut bindings = HashMap::new();
                bindings.insert("error".to_string(), error_binding(&err));

                context.push_scope(bindings);
                let caught = runner.run_steps(catch, context, depth + 1).await;
                context.pop_scope()?;
                caught
            }
        };

        if !finally.is_empty() {
            runner.run_steps(finally, context, depth + 1).await?;
        }

        outcome
    }
}

/// The `error` variable visible to catch steps
fn error_binding(err: &EngineError) -> Value {
    json!({
        "message": err.root_cause().to_string(),
        "step_type": innermost_step_type(err),
    })
}

/// Type tag of the step closest to the root cause, walking the wrap chain
fn innermost_step_type(err: &EngineError) -> Option<&str> {
    let mut current = err;
    let mut found = None;
    while let EngineError::Step { step_type, source, .. } = current {
        found = Some(step_type.as_str());
        current = source;
    }
    found
}
