//! Data transformation steps

use super::{wrong_step, StepHandler, StepRunner};
use crate::core::{ContextManager, Step, StepType};
use crate::error::EngineError;
use crate::registry::TransformRegistry;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Applies a named operation from the transform registry to the step's
/// resolved input
pub struct TransformHandler {
    registry: Arc<dyn TransformRegistry>,
}

impl TransformHandler {
    pub fn new(registry: Arc<dyn TransformRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StepHandler for TransformHandler {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ContextManager,
        _runner: &dyn StepRunner,
        _depth: usize,
    ) -> Result<Value, EngineError> {
        let Step::Transform { operation, input, .. } = step else {
            return Err(wrong_step(StepType::Transform, step));
        };

        let resolved = context.resolve_value(input)?;
        self.registry.apply(operation, resolved)
    }
}
