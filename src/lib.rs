//! flowline - A declarative pipeline execution engine

pub mod cli;
pub mod core;
pub mod error;
pub mod execution;
pub mod registry;
pub mod tokenizer;
pub mod validator;

// Re-export commonly used types
pub use core::{Condition, ContextManager, ExecutionStats, Operator, Pipeline, Step, StepType};
pub use error::{ContextError, EngineError};
pub use execution::{
    ExecutionFailure, ExecutionOutcome, PipelineExecutor, ResourceLimits, StepHandler, StepRunner,
};
pub use registry::{
    Ability, AbilityRegistry, InMemoryAbilityRegistry, InMemoryTransformRegistry,
    TransformRegistry,
};
pub use tokenizer::DataTokenizer;
pub use validator::PipelineValidator;
