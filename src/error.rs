//! Error types for context resolution and pipeline execution

use thiserror::Error;

/// Errors raised while resolving variables and paths in the context
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The base variable of a reference does not exist in any scope
    #[error("undefined variable: ${0}")]
    UndefinedVariable(String),

    /// A key or array index in the path does not exist
    #[error("undefined key `{key}` while resolving `{reference}`")]
    UndefinedKey { key: String, reference: String },

    /// A named property in the path does not exist on the object
    #[error("undefined property `{property}` while resolving `{reference}`")]
    UndefinedProperty { property: String, reference: String },

    /// A non-final path segment landed on a scalar value
    #[error("cannot index into {value_kind} at `{segment}` while resolving `{reference}`")]
    NotIndexable {
        value_kind: &'static str,
        segment: String,
        reference: String,
    },

    /// Attempt to pop the root scope
    #[error("cannot pop the root scope")]
    CannotPopRoot,
}

/// Errors raised by the pipeline executor and step handlers
#[derive(Debug, Error)]
pub enum EngineError {
    /// The pipeline has no steps to run
    #[error("pipeline has no steps")]
    EmptyPipeline,

    /// The global step budget was exhausted
    #[error("step limit exceeded: {limit} steps")]
    StepLimitExceeded { limit: usize },

    /// Nested control flow exceeded the recursion budget
    #[error("depth limit exceeded: {limit} levels")]
    DepthLimitExceeded { limit: usize },

    /// The wall-clock budget for the run was exhausted
    #[error("timeout exceeded: {0:.1}s elapsed")]
    TimeoutExceeded(f64),

    /// No handler is registered for the step's type
    #[error("unknown step type: {0}")]
    UnknownStepType(String),

    /// The ability registry has no entry for the requested name
    #[error("ability not found: {0}")]
    AbilityNotFound(String),

    /// The transform registry has no entry for the requested operation
    #[error("unknown transform operation: {0}")]
    UnknownOperation(String),

    /// Variable resolution failed inside a step
    #[error(transparent)]
    Context(#[from] ContextError),

    /// A step handler failed; carries the failing step's type and config
    #[error("{step_type} step failed: {message}")]
    Step {
        step_type: String,
        message: String,
        #[source]
        source: Box<EngineError>,
    },

    /// An ability or transform implementation failed
    #[error("{0}")]
    Handler(String),
}

impl EngineError {
    /// Wrap a failure with the type of the step it occurred in.
    ///
    /// Keeps the original error as the source so nested failures form a
    /// readable chain without losing the root cause.
    pub fn in_step(self, step_type: &str) -> Self {
        EngineError::Step {
            step_type: step_type.to_string(),
            message: self.to_string(),
            source: Box::new(self),
        }
    }

    /// Short machine-readable code for the error variant
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::EmptyPipeline => "empty_pipeline",
            EngineError::StepLimitExceeded { .. } => "step_limit_exceeded",
            EngineError::DepthLimitExceeded { .. } => "depth_limit_exceeded",
            EngineError::TimeoutExceeded(_) => "timeout_exceeded",
            EngineError::UnknownStepType(_) => "unknown_step_type",
            EngineError::AbilityNotFound(_) => "ability_not_found",
            EngineError::UnknownOperation(_) => "unknown_operation",
            EngineError::Context(_) => "context_error",
            EngineError::Step { .. } => "step_failed",
            EngineError::Handler(_) => "handler_error",
        }
    }

    /// Walk the source chain down to the original failure
    pub fn root_cause(&self) -> &EngineError {
        match self {
            EngineError::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
