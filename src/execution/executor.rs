//! Pipeline execution engine
//!
//! Owns the handler registry and the per-run resource accounting. Every
//! step dispatch, at any nesting depth, funnels through [`PipelineExecutor`]
//! so the step budget, depth limit, and wall-clock timeout are enforced in
//! exactly one place.

use crate::core::{ContextManager, ExecutionStats, Pipeline, Step, StepType};
use crate::error::EngineError;
use crate::execution::handlers::{default_handlers, StepHandler, StepRunner};
use crate::registry::{AbilityRegistry, TransformRegistry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

fn default_max_steps() -> usize {
    1000
}

fn default_max_depth() -> usize {
    10
}

fn default_timeout_seconds() -> f64 {
    300.0
}

/// Per-run resource limits. Fields omitted in a partial definition fall
/// back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum number of step dispatches, nested steps included
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Maximum nesting depth of step lists
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Wall-clock budget for the whole run, in seconds
    #[serde(default = "default_timeout_seconds", alias = "timeout")]
    pub timeout_seconds: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_depth: default_max_depth(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Everything a successful run produces: the last step's result, the final
/// root context, and the run statistics
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Always true; kept so the outcome record matches the result contract
    pub success: bool,

    /// The last executed step's result
    pub result: Value,

    /// Final variable bindings visible at the root scope
    pub context: HashMap<String, Value>,

    /// Statistics for the run
    pub stats: ExecutionStats,
}

/// A failed run: the propagated error together with the sealed statistics
/// and the context as it stood when the failure surfaced
#[derive(Debug)]
pub struct ExecutionFailure {
    /// The wrapped error chain, root cause preserved as `source`
    pub error: EngineError,

    /// Variable bindings visible at the root scope when the run stopped
    pub context: HashMap<String, Value>,

    /// Statistics for the run, sealed with the error recorded
    pub stats: ExecutionStats,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for ExecutionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Executes pipelines by dispatching each step to the handler registered
/// for its type
pub struct PipelineExecutor {
    handlers: HashMap<StepType, Arc<dyn StepHandler>>,
    limits: ResourceLimits,
}

impl PipelineExecutor {
    /// Create an executor with the built-in handler set
    pub fn new(
        abilities: Arc<dyn AbilityRegistry>,
        transforms: Arc<dyn TransformRegistry>,
    ) -> Self {
        Self {
            handlers: default_handlers(abilities, transforms),
            limits: ResourceLimits::default(),
        }
    }

    /// Replace the default resource limits
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Register or replace the handler for one step type
    pub fn with_handler(mut self, step_type: StepType, handler: Arc<dyn StepHandler>) -> Self {
        self.handlers.insert(step_type, handler);
        self
    }

    /// Run a pipeline to completion.
    ///
    /// The root scope is seeded with the pipeline's declared variables,
    /// overridden by the caller's initial context. An unhandled failure
    /// propagates to the caller as an [`ExecutionFailure`] carrying the
    /// error chain plus the sealed stats; only a `try_catch` step inside
    /// the pipeline can recover from a step failure.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        initial_context: HashMap<String, Value>,
    ) -> Result<ExecutionOutcome, ExecutionFailure> {
        if pipeline.steps.is_empty() {
            return Err(fail(EngineError::EmptyPipeline, HashMap::new()));
        }

        let mut variables = pipeline.variables.clone();
        variables.extend(initial_context);
        let mut context = ContextManager::with_variables(variables);

        let state = RunState {
            started: Instant::now(),
            steps: AtomicUsize::new(0),
            stats: Mutex::new(ExecutionStats::new()),
        };
        let run = Run {
            executor: self,
            state: &state,
        };

        info!(pipeline = %pipeline.name, "starting pipeline run");
        let result = run.run_steps(&pipeline.steps, &mut context, 0).await;

        let mut stats = state
            .stats
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        match result {
            Ok(value) => {
                stats.finish();
                info!(
                    pipeline = %pipeline.name,
                    steps = stats.steps_executed,
                    duration_ms = stats.duration_ms,
                    "pipeline run succeeded"
                );
                Ok(ExecutionOutcome {
                    success: true,
                    result: value,
                    context: context.get_all(true),
                    stats,
                })
            }
            Err(error) => {
                stats.finish_with_error(&error);
                warn!(pipeline = %pipeline.name, error = %error, "pipeline run failed");
                Err(ExecutionFailure {
                    error,
                    context: context.get_all(true),
                    stats,
                })
            }
        }
    }
}

fn fail(error: EngineError, context: HashMap<String, Value>) -> ExecutionFailure {
    let mut stats = ExecutionStats::new();
    stats.finish_with_error(&error);
    ExecutionFailure {
        error,
        context,
        stats,
    }
}

/// Mutable accounting shared by every dispatch in one run
struct RunState {
    started: Instant,
    steps: AtomicUsize,
    stats: Mutex<ExecutionStats>,
}

/// The engine's own [`StepRunner`]: limit checks, stats, handler dispatch,
/// and output promotion for a single run
struct Run<'a> {
    executor: &'a PipelineExecutor,
    state: &'a RunState,
}

impl Run<'_> {
    fn lock_stats(&self) -> MutexGuard<'_, ExecutionStats> {
        self.state
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StepRunner for Run<'_> {
    async fn run_step(
        &self,
        step: &Step,
        context: &mut ContextManager,
        depth: usize,
    ) -> Result<Value, EngineError> {
        let limits = &self.executor.limits;

        if depth >= limits.max_depth {
            return Err(EngineError::DepthLimitExceeded {
                limit: limits.max_depth,
            });
        }
        if self.state.started.elapsed().as_secs_f64() > limits.timeout_seconds {
            return Err(EngineError::TimeoutExceeded(limits.timeout_seconds));
        }
        // dispatch count across all branches, parallel ones included
        let dispatched = self.state.steps.fetch_add(1, Ordering::SeqCst);
        if dispatched >= limits.max_steps {
            return Err(EngineError::StepLimitExceeded {
                limit: limits.max_steps,
            });
        }

        let step_type = step.step_type();
        self.lock_stats().record_step(step_type);
        debug!(step_type = %step_type, depth, "dispatching step");

        let handler = self
            .executor
            .handlers
            .get(&step_type)
            .ok_or_else(|| EngineError::UnknownStepType(step_type.to_string()))?;

        match handler.execute(step, context, self, depth).await {
            Ok(value) => {
                if let Some(output) = step.output() {
                    context.set(output, value.clone());
                }
                Ok(value)
            }
            Err(err) => {
                // record at the failing step only, not at every ancestor
                if !matches!(err, EngineError::Step { .. }) {
                    self.lock_stats()
                        .record_error(step_type, step.config(), err.to_string());
                }
                Err(err.in_step(step_type.as_str()))
            }
        }
    }

    async fn run_steps(
        &self,
        steps: &[Step],
        context: &mut ContextManager,
        depth: usize,
    ) -> Result<Value, EngineError> {
        let mut last = Value::Null;
        for step in steps {
            last = self.run_step(step, context, depth).await?;
        }
        Ok(last)
    }
}
