//! Execution statistics
//!
//! One record is created fresh per `execute()` call and finalized when the
//! run completes or fails; nothing here is persisted.

use crate::core::pipeline::StepType;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// A step failure captured during the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepErrorRecord {
    /// Type tag of the failing step
    pub step_type: String,

    /// Full configuration of the failing step
    pub step_config: Value,

    /// Failure message
    pub message: String,
}

/// The error that terminated the run, presentable to an operator as-is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    /// Human-readable failure message (includes the step chain)
    pub message: String,

    /// Machine-readable code of the root cause
    pub code: String,
}

/// Statistics accumulated over a single pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Unique ID for this run
    pub execution_id: Uuid,

    /// Total steps dispatched (successful or not)
    pub steps_executed: usize,

    /// Dispatch counts per step type
    pub steps_by_type: HashMap<String, usize>,

    /// Failures observed during the run, in order
    pub errors: Vec<StepErrorRecord>,

    /// When execution started
    pub started_at: DateTime<Utc>,

    /// When execution completed or failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: Option<u64>,

    /// Peak resident set size in bytes, where the platform exposes it
    pub peak_memory_bytes: Option<u64>,

    /// Whether the run completed without an unhandled failure
    pub success: bool,

    /// The terminating error, when `success` is false
    pub error: Option<RunError>,
}

impl ExecutionStats {
    /// Create stats for a run starting now
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            steps_executed: 0,
            steps_by_type: HashMap::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            peak_memory_bytes: None,
            success: false,
            error: None,
        }
    }

    /// Count one dispatched step
    pub fn record_step(&mut self, step_type: StepType) {
        self.steps_executed += 1;
        *self
            .steps_by_type
            .entry(step_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Record a step failure
    pub fn record_error(&mut self, step_type: StepType, step_config: Value, message: String) {
        self.errors.push(StepErrorRecord {
            step_type: step_type.as_str().to_string(),
            step_config,
            message,
        });
    }

    /// Finalize a successful run
    pub fn finish(&mut self) {
        self.success = true;
        self.seal();
    }

    /// Finalize a failed run, capturing the terminating error
    pub fn finish_with_error(&mut self, error: &EngineError) {
        self.success = false;
        self.error = Some(RunError {
            message: error.to_string(),
            code: error.root_cause().code().to_string(),
        });
        self.seal();
    }

    fn seal(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = Some(
            (now - self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.peak_memory_bytes = peak_memory_bytes();
    }
}

impl Default for ExecutionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Peak RSS for this process, read from procfs, `None` elsewhere
fn peak_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|line| line.starts_with("VmHWM:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}
