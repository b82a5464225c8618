//! Core domain models for the pipeline engine
//!
//! This module defines the fundamental data structures that represent
//! pipelines, steps, conditions, and the scoped execution context.

pub mod condition;
pub mod context;
pub mod path;
pub mod pipeline;
pub mod stats;

pub use condition::{Condition, Operator};
pub use context::ContextManager;
pub use pipeline::{Pipeline, Step, StepType};
pub use stats::{ExecutionStats, RunError, StepErrorRecord};
