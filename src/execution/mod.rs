//! Step dispatch and resource-limited pipeline execution

pub mod executor;
pub mod handlers;

pub use executor::{ExecutionFailure, ExecutionOutcome, PipelineExecutor, ResourceLimits};
pub use handlers::{default_handlers, StepHandler, StepRunner};
