//! Loop iteration

use super::{wrong_step, StepHandler, StepRunner};
use crate::core::{ContextManager, Step, StepType};
use crate::error::EngineError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;

/// Runs the loop body once per element of the resolved input collection.
///
/// Each iteration gets a fresh scope binding `item` and `index`; the scope
/// is popped whether the body succeeds or fails, so a failing iteration
/// never leaks its bindings into the surrounding context.
pub struct LoopHandler;

#[async_trait]
impl StepHandler for LoopHandler {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ContextManager,
        runner: &dyn StepRunner,
        depth: usize,
    ) -> Result<Value, EngineError> {
        let Step::Loop { input, steps, .. } = step else {
            return Err(wrong_step(StepType::Loop, step));
        };

        let collection = context.resolve_value(input)?;
        let Value::Array(items) = collection else {
            return Err(EngineError::Handler(format!(
                "loop input must resolve to an array, got {}",
                value_kind(&collection)
            )));
        };

        debug!(iterations = items.len(), "entering loop");

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let mut bindings = HashMap::new();
            bindings.insert("item".to_string(), item);
            bindings.insert("index".to_string(), json!(index));

            context.push_scope(bindings);
            let iteration = runner.run_steps(steps, context, depth + 1).await;
            context.pop_scope()?;

            results.push(iteration?);
        }

        Ok(Value::Array(results))
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
