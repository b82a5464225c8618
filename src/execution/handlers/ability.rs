//! External ability invocation

use super::{wrong_step, StepHandler, StepRunner};
use crate::core::{ContextManager, Step, StepType};
use crate::error::EngineError;
use crate::registry::AbilityRegistry;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Resolves the step's input against the context and invokes a registered
/// ability with it
pub struct AbilityHandler {
    registry: Arc<dyn AbilityRegistry>,
}

impl AbilityHandler {
    pub fn new(registry: Arc<dyn AbilityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StepHandler for AbilityHandler {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ContextManager,
        _runner: &dyn StepRunner,
        _depth: usize,
    ) -> Result<Value, EngineError> {
        let Step::Ability { ability, input, .. } = step else {
            return Err(wrong_step(StepType::Ability, step));
        };

        let implementation = self
            .registry
            .lookup(ability)
            .ok_or_else(|| EngineError::AbilityNotFound(ability.clone()))?;

        let resolved = context.resolve_value(input)?;
        debug!(ability = %ability, "invoking ability");
        implementation.invoke(resolved).await
    }
}
