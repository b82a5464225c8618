//! Step handlers
//!
//! Each step type is executed by a handler registered under its type tag.
//! Handlers receive the step, the live context, and a [`StepRunner`] they
//! use to dispatch nested step lists back through the engine, so resource
//! accounting and depth tracking stay centralized no matter how deep the
//! tree goes.

mod ability;
mod conditional;
mod loop_step;
mod parallel;
mod sub_pipeline;
mod transform;
mod try_catch;

pub use ability::AbilityHandler;
pub use conditional::ConditionalHandler;
pub use loop_step::LoopHandler;
pub use parallel::ParallelHandler;
pub use sub_pipeline::SubPipelineHandler;
pub use transform::TransformHandler;
pub use try_catch::TryCatchHandler;

use crate::core::{ContextManager, Step, StepType};
use crate::error::EngineError;
use crate::registry::{AbilityRegistry, TransformRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Dispatch interface handlers use to run nested steps.
///
/// Implemented by the engine itself; keeps limit checks and stats in one
/// place instead of re-implementing them per handler.
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Run a single step at the given nesting depth
    async fn run_step(
        &self,
        step: &Step,
        context: &mut ContextManager,
        depth: usize,
    ) -> Result<Value, EngineError>;

    /// Run an ordered step list, returning the last step's result
    async fn run_steps(
        &self,
        steps: &[Step],
        context: &mut ContextManager,
        depth: usize,
    ) -> Result<Value, EngineError>;
}

/// Executes one kind of step
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(
        &self,
        step: &Step,
        context: &mut ContextManager,
        runner: &dyn StepRunner,
        depth: usize,
    ) -> Result<Value, EngineError>;
}

/// The full handler set for the built-in step types
pub fn default_handlers(
    abilities: Arc<dyn AbilityRegistry>,
    transforms: Arc<dyn TransformRegistry>,
) -> HashMap<StepType, Arc<dyn StepHandler>> {
    let mut handlers: HashMap<StepType, Arc<dyn StepHandler>> = HashMap::new();
    handlers.insert(StepType::Ability, Arc::new(AbilityHandler::new(abilities)));
    handlers.insert(
        StepType::Transform,
        Arc::new(TransformHandler::new(transforms)),
    );
    handlers.insert(StepType::Conditional, Arc::new(ConditionalHandler));
    handlers.insert(StepType::Loop, Arc::new(LoopHandler));
    handlers.insert(StepType::Parallel, Arc::new(ParallelHandler));
    handlers.insert(StepType::TryCatch, Arc::new(TryCatchHandler));
    handlers.insert(StepType::SubPipeline, Arc::new(SubPipelineHandler));
    handlers
}

/// A handler was dispatched a step of a kind it does not execute.
/// Only reachable through a miswired custom handler map.
pub(crate) fn wrong_step(expected: StepType, got: &Step) -> EngineError {
    EngineError::Handler(format!(
        "handler for `{}` received a `{}` step",
        expected,
        got.step_type()
    ))
}
