//! Pipeline domain model
//!
//! A pipeline is a named, ordered list of steps. Steps form a closed sum
//! type discriminated by a `type` tag, so each kind carries exactly the
//! fields it needs and nesting (branches, loop bodies, sub-pipelines) is
//! part of the shape. Definitions load from JSON or YAML; both go through
//! `serde_json::Value`, which is also what the validator inspects.

use crate::core::condition::Condition;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// A pipeline definition; immutable once execution starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Default variable bindings, seeded below the caller's initial context
    #[serde(default)]
    pub variables: HashMap<String, Value>,

    /// Ordered top-level steps
    pub steps: Vec<Step>,
}

/// One unit of work in a pipeline, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Invoke a named external ability with a resolved input record
    Ability {
        ability: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        output: Option<String>,
    },
    /// Apply a named transformation operation to a resolved input
    Transform {
        operation: String,
        input: Value,
        #[serde(default)]
        output: Option<String>,
    },
    /// Branch on a structured predicate
    Conditional {
        condition: Condition,
        #[serde(default)]
        then: Vec<Step>,
        #[serde(default, rename = "else")]
        r#else: Vec<Step>,
        #[serde(default)]
        output: Option<String>,
    },
    /// Iterate the body over a collection (or a `$` reference to one)
    Loop {
        input: Value,
        steps: Vec<Step>,
        #[serde(default)]
        output: Option<String>,
    },
    /// Run each branch step concurrently against an isolated context
    Parallel {
        steps: Vec<Step>,
        #[serde(default)]
        output: Option<String>,
    },
    /// Run `try`, recover via `catch`, always run `finally`
    TryCatch {
        #[serde(rename = "try")]
        r#try: Vec<Step>,
        #[serde(default)]
        catch: Vec<Step>,
        #[serde(default)]
        finally: Vec<Step>,
        #[serde(default)]
        output: Option<String>,
    },
    /// Delegate to a nested pipeline in an isolated scope
    SubPipeline {
        pipeline: Pipeline,
        #[serde(default)]
        output: Option<String>,
    },
}

/// The discriminant of a step, used as the handler registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Ability,
    Transform,
    Conditional,
    Loop,
    Parallel,
    TryCatch,
    SubPipeline,
}

impl StepType {
    /// All step types the engine knows about
    pub const ALL: [StepType; 7] = [
        StepType::Ability,
        StepType::Transform,
        StepType::Conditional,
        StepType::Loop,
        StepType::Parallel,
        StepType::TryCatch,
        StepType::SubPipeline,
    ];

    /// The wire tag for this step type
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Ability => "ability",
            StepType::Transform => "transform",
            StepType::Conditional => "conditional",
            StepType::Loop => "loop",
            StepType::Parallel => "parallel",
            StepType::TryCatch => "try_catch",
            StepType::SubPipeline => "sub_pipeline",
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Step {
    /// The discriminant of this step
    pub fn step_type(&self) -> StepType {
        match self {
            Step::Ability { .. } => StepType::Ability,
            Step::Transform { .. } => StepType::Transform,
            Step::Conditional { .. } => StepType::Conditional,
            Step::Loop { .. } => StepType::Loop,
            Step::Parallel { .. } => StepType::Parallel,
            Step::TryCatch { .. } => StepType::TryCatch,
            Step::SubPipeline { .. } => StepType::SubPipeline,
        }
    }

    /// The variable name this step's result should be written to, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Step::Ability { output, .. }
            | Step::Transform { output, .. }
            | Step::Conditional { output, .. }
            | Step::Loop { output, .. }
            | Step::Parallel { output, .. }
            | Step::TryCatch { output, .. }
            | Step::SubPipeline { output, .. } => output.as_deref(),
        }
    }

    /// The step's full configuration as a JSON value, for error records
    pub fn config(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Pipeline {
    /// Parse a pipeline definition from a JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse pipeline JSON")
    }

    /// Parse a pipeline definition from a YAML string
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(raw).context("Failed to parse pipeline YAML")?;
        serde_json::from_value(value).context("Invalid pipeline definition")
    }

    /// Load a pipeline definition from a file, dispatching on extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&raw),
            _ => Self::from_json(&raw),
        }
    }

    /// Load the raw, untyped form of a definition file, as the validator
    /// inspects it
    pub fn raw_from_file(path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&raw).context("Failed to parse pipeline YAML")
            }
            _ => serde_json::from_str(&raw).context("Failed to parse pipeline JSON"),
        }
    }

    /// Build a typed pipeline from an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).context("Invalid pipeline definition")
    }

    /// The raw JSON form of this pipeline, as the validator inspects it
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tagged_steps() {
        let pipeline = Pipeline::from_value(json!({
            "name": "publish",
            "steps": [
                {"type": "ability", "ability": "create_post", "input": {"title": "$title"}, "output": "post"},
                {"type": "transform", "operation": "upper", "input": "$post.title"}
            ]
        }))
        .unwrap();

        assert_eq!(pipeline.name, "publish");
        assert_eq!(pipeline.steps.len(), 2);
        assert_eq!(pipeline.steps[0].step_type(), StepType::Ability);
        assert_eq!(pipeline.steps[0].output(), Some("post"));
        assert_eq!(pipeline.steps[1].step_type(), StepType::Transform);
        assert_eq!(pipeline.steps[1].output(), None);
    }

    #[test]
    fn test_parse_nested_control_flow() {
        let pipeline = Pipeline::from_value(json!({
            "name": "nested",
            "steps": [{
                "type": "conditional",
                "condition": {"left": "$ok", "op": "truthy"},
                "then": [{"type": "ability", "ability": "a"}],
                "else": [{"type": "ability", "ability": "b"}]
            }, {
                "type": "try_catch",
                "try": [{"type": "ability", "ability": "risky"}],
                "catch": [{"type": "ability", "ability": "fallback"}]
            }]
        }))
        .unwrap();

        match &pipeline.steps[0] {
            Step::Conditional { then, r#else, .. } => {
                assert_eq!(then.len(), 1);
                assert_eq!(r#else.len(), 1);
            }
            other => panic!("Expected conditional, got {:?}", other),
        }
        match &pipeline.steps[1] {
            Step::TryCatch { r#try, catch, finally, .. } => {
                assert_eq!(r#try.len(), 1);
                assert_eq!(catch.len(), 1);
                assert!(finally.is_empty());
            }
            other => panic!("Expected try_catch, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = Pipeline::from_value(json!({
            "name": "bad",
            "steps": [{"type": "teleport"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_and_json_agree() {
        let yaml = r#"
name: "greet"
variables:
  who: "world"
steps:
  - type: transform
    operation: upper
    input: "$who"
    output: greeting
"#;
        let json = r#"{
            "name": "greet",
            "variables": {"who": "world"},
            "steps": [
                {"type": "transform", "operation": "upper", "input": "$who", "output": "greeting"}
            ]
        }"#;

        let from_yaml = Pipeline::from_yaml(yaml).unwrap();
        let from_json = Pipeline::from_json(json).unwrap();
        assert_eq!(from_yaml.to_value(), from_json.to_value());
    }

    #[test]
    fn test_sub_pipeline_nesting() {
        let pipeline = Pipeline::from_value(json!({
            "name": "outer",
            "steps": [{
                "type": "sub_pipeline",
                "pipeline": {
                    "name": "inner",
                    "steps": [{"type": "ability", "ability": "noop"}]
                },
                "output": "inner_result"
            }]
        }))
        .unwrap();

        match &pipeline.steps[0] {
            Step::SubPipeline { pipeline: inner, .. } => {
                assert_eq!(inner.name, "inner");
                assert_eq!(inner.steps.len(), 1);
            }
            other => panic!("Expected sub_pipeline, got {:?}", other),
        }
    }

    #[test]
    fn test_step_config_round_trip() {
        let step = Step::Ability {
            ability: "create_post".to_string(),
            input: json!({"title": "hi"}),
            output: None,
        };
        let config = step.config();
        assert_eq!(config["type"], json!("ability"));
        assert_eq!(config["ability"], json!("create_post"));
    }
}
